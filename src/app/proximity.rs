// src/app/proximity.rs — fire a callback when a sentinel scrolls near the viewport
use std::str::FromStr;

use eframe::egui as eg;
use thiserror::Error;
use tracing::trace;

pub const DEFAULT_THRESHOLD: f32 = 0.1;
/// Reach 100px past the bottom edge so the next page starts before the end is visible.
pub const DEFAULT_ROOT_MARGIN: &str = "0px 0px 100px 0px";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarginParseError {
    #[error("expected 1 to 4 margin values, got {0}")]
    Arity(usize),
    #[error("bad margin value `{0}` (use px or %)")]
    Value(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarginValue {
    Px(f32),
    Percent(f32),
}

impl MarginValue {
    fn resolve(self, basis: f32) -> f32 {
        match self {
            Self::Px(v) => v,
            Self::Percent(p) => basis * p / 100.0,
        }
    }
}

impl FromStr for MarginValue {
    type Err = MarginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MarginParseError::Value(s.to_string());
        if let Some(n) = s.strip_suffix("px") {
            n.parse().map(Self::Px).map_err(|_| bad())
        } else if let Some(n) = s.strip_suffix('%') {
            n.parse().map(Self::Percent).map_err(|_| bad())
        } else if s == "0" {
            Ok(Self::Px(0.0))
        } else {
            Err(bad())
        }
    }
}

/// CSS-style margin shorthand (top, right, bottom, left) that grows the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl RootMargin {
    pub const ZERO: Self = Self {
        top: MarginValue::Px(0.0),
        right: MarginValue::Px(0.0),
        bottom: MarginValue::Px(0.0),
        left: MarginValue::Px(0.0),
    };

    /// Percentages resolve against the root's height (top/bottom) or width (left/right).
    pub fn expand(&self, root: eg::Rect) -> eg::Rect {
        let (w, h) = (root.width(), root.height());
        eg::Rect::from_min_max(
            eg::pos2(
                root.min.x - self.left.resolve(w),
                root.min.y - self.top.resolve(h),
            ),
            eg::pos2(
                root.max.x + self.right.resolve(w),
                root.max.y + self.bottom.resolve(h),
            ),
        )
    }
}

impl FromStr for RootMargin {
    type Err = MarginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals = s
            .split_whitespace()
            .map(MarginValue::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        let [top, right, bottom, left] = match vals.as_slice() {
            [a] => [*a, *a, *a, *a],
            [v, h] => [*v, *h, *v, *h],
            [t, h, b] => [*t, *h, *b, *h],
            [t, r, b, l] => [*t, *r, *b, *l],
            other => return Err(MarginParseError::Arity(other.len())),
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            bottom: MarginValue::Px(100.0),
            ..Self::ZERO
        }
    }
}

/// Visible fraction of `target` inside `root`. A zero-area target counts as
/// fully visible when it sits inside (or on the edge of) `root`.
pub fn intersection_ratio(target: eg::Rect, root: eg::Rect) -> f32 {
    let x0 = target.min.x.max(root.min.x);
    let y0 = target.min.y.max(root.min.y);
    let x1 = target.max.x.min(root.max.x);
    let y1 = target.max.y.min(root.max.y);
    if x1 < x0 || y1 < y0 {
        return 0.0;
    }
    let area = target.width().max(0.0) * target.height().max(0.0);
    if area <= 0.0 {
        return 1.0;
    }
    ((x1 - x0) * (y1 - y0) / area).clamp(0.0, 1.0)
}

#[derive(Default)]
struct Observation {
    was_intersecting: bool,
}

/// Immediate-mode stand-in for an intersection observer: feed it the
/// sentinel's rect and the visible viewport every frame. The callback runs
/// once per transition from "not visible" to "visible".
pub struct ProximityTrigger {
    callback: Box<dyn FnMut()>,
    threshold: f32,
    margin: RootMargin,
    enabled: bool,
    observation: Option<Observation>,
}

impl ProximityTrigger {
    pub fn new(callback: impl FnMut() + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            threshold: DEFAULT_THRESHOLD,
            margin: RootMargin::default(),
            enabled: true,
            observation: Some(Observation::default()),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.set_threshold(threshold);
        self
    }

    pub fn with_root_margin(mut self, margin: RootMargin) -> Self {
        self.set_root_margin(margin);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn root_margin(&self) -> RootMargin {
        self.margin
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_observing(&self) -> bool {
        self.observation.is_some()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.enabled = enabled;
            self.reconnect();
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        let threshold = threshold.clamp(0.0, 1.0);
        if threshold != self.threshold {
            self.threshold = threshold;
            self.reconnect();
        }
    }

    pub fn set_root_margin(&mut self, margin: RootMargin) {
        if margin != self.margin {
            self.margin = margin;
            self.reconnect();
        }
    }

    /// A new callback always starts a fresh observation.
    pub fn set_callback(&mut self, callback: impl FnMut() + 'static) {
        self.callback = Box::new(callback);
        self.reconnect();
    }

    pub fn disconnect(&mut self) {
        if self.observation.take().is_some() {
            trace!("proximity observation released");
        }
    }

    fn reconnect(&mut self) {
        self.disconnect();
        if self.enabled {
            self.observation = Some(Observation::default());
        }
    }

    /// Returns true if the callback ran this frame.
    pub fn observe(&mut self, sentinel: eg::Rect, viewport: eg::Rect) -> bool {
        let Some(obs) = self.observation.as_mut() else {
            return false;
        };
        let root = self.margin.expand(viewport);
        let touching = sentinel.max.x >= root.min.x
            && sentinel.min.x <= root.max.x
            && sentinel.max.y >= root.min.y
            && sentinel.min.y <= root.max.y;
        let intersecting = touching && intersection_ratio(sentinel, root) >= self.threshold;

        let entered = intersecting && !obs.was_intersecting;
        obs.was_intersecting = intersecting;
        if entered {
            (self.callback)();
        }
        entered
    }
}

impl Drop for ProximityTrigger {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn viewport() -> eg::Rect {
        eg::Rect::from_min_size(eg::pos2(0.0, 0.0), eg::vec2(400.0, 600.0))
    }

    fn sentinel_at(y: f32) -> eg::Rect {
        eg::Rect::from_min_size(eg::pos2(0.0, y), eg::vec2(400.0, 20.0))
    }

    fn counting() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        (hits, move || h.set(h.get() + 1))
    }

    #[test]
    fn fires_once_per_entry() {
        let (hits, cb) = counting();
        let mut t = ProximityTrigger::new(cb).with_root_margin(RootMargin::ZERO);

        assert!(!t.observe(sentinel_at(900.0), viewport()));
        assert!(t.observe(sentinel_at(590.0), viewport()));
        assert!(!t.observe(sentinel_at(500.0), viewport()));
        assert!(!t.observe(sentinel_at(400.0), viewport()));
        assert_eq!(hits.get(), 1);

        // scroll away and come back
        t.observe(sentinel_at(2000.0), viewport());
        t.observe(sentinel_at(300.0), viewport());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn disabled_trigger_never_fires() {
        let (hits, cb) = counting();
        let mut t = ProximityTrigger::new(cb);
        t.set_enabled(false);
        assert!(!t.is_observing());
        for y in [900.0, 300.0, 900.0, 100.0] {
            t.observe(sentinel_at(y), viewport());
        }
        assert_eq!(hits.get(), 0);

        // re-enabling starts a fresh observation, so a visible sentinel fires
        t.set_enabled(true);
        assert!(t.is_observing());
        assert!(t.observe(sentinel_at(100.0), viewport()));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn bottom_margin_fires_early() {
        let (hits, cb) = counting();
        let mut t = ProximityTrigger::new(cb);
        // 50px below the fold: inside the default 100px margin
        assert!(t.observe(sentinel_at(650.0), viewport()));
        assert_eq!(hits.get(), 1);

        let (late_hits, cb) = counting();
        let mut late = ProximityTrigger::new(cb).with_root_margin(RootMargin::ZERO);
        assert!(!late.observe(sentinel_at(650.0), viewport()));
        assert_eq!(late_hits.get(), 0);
    }

    #[test]
    fn threshold_requires_enough_visible_area() {
        let (hits, cb) = counting();
        let mut t = ProximityTrigger::new(cb)
            .with_root_margin(RootMargin::ZERO)
            .with_threshold(0.5);
        // 5 of 20px visible
        assert!(!t.observe(sentinel_at(595.0), viewport()));
        // 15 of 20px visible
        assert!(t.observe(sentinel_at(585.0), viewport()));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn config_changes_restart_the_observation() {
        let (hits, cb) = counting();
        let mut t = ProximityTrigger::new(cb);
        t.observe(sentinel_at(100.0), viewport());
        assert_eq!(hits.get(), 1);

        t.set_threshold(0.2);
        t.observe(sentinel_at(100.0), viewport());
        assert_eq!(hits.get(), 2);

        // same value: no restart
        t.set_threshold(0.2);
        t.observe(sentinel_at(100.0), viewport());
        assert_eq!(hits.get(), 2);

        let (new_hits, cb) = counting();
        t.set_callback(cb);
        t.observe(sentinel_at(100.0), viewport());
        assert_eq!(hits.get(), 2);
        assert_eq!(new_hits.get(), 1);
    }

    #[test]
    fn zero_height_sentinel_counts_when_inside() {
        let line = eg::Rect::from_min_size(eg::pos2(0.0, 300.0), eg::vec2(400.0, 0.0));
        assert_eq!(intersection_ratio(line, viewport()), 1.0);
        let far = eg::Rect::from_min_size(eg::pos2(0.0, 3000.0), eg::vec2(400.0, 0.0));
        assert_eq!(intersection_ratio(far, viewport()), 0.0);
    }

    #[test]
    fn parses_css_shorthand() {
        let m: RootMargin = DEFAULT_ROOT_MARGIN.parse().unwrap();
        assert_eq!(m, RootMargin::default());

        let two: RootMargin = "10px 5%".parse().unwrap();
        assert_eq!(two.top, MarginValue::Px(10.0));
        assert_eq!(two.left, MarginValue::Percent(5.0));
        let grown = two.expand(viewport());
        assert_eq!(grown.min.x, -20.0);
        assert_eq!(grown.max.y, 610.0);

        assert_eq!("0".parse::<RootMargin>().unwrap(), RootMargin::ZERO);
        assert_eq!("".parse::<RootMargin>(), Err(MarginParseError::Arity(0)));
        assert_eq!(
            "1px 2px 3px 4px 5px".parse::<RootMargin>(),
            Err(MarginParseError::Arity(5))
        );
        assert!(matches!("12em".parse::<RootMargin>(), Err(MarginParseError::Value(_))));
    }
}
