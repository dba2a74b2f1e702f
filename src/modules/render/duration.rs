//! Best-effort guess of how long an animation wants to play, in seconds.

use regex::Regex;
use std::sync::LazyLock;

// `gsap.to(el, { duration: 3 })`, `duration: 7` in a description block.
static DURATION_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bduration\s*:\s*(\d+(?:\.\d+)?)").expect("valid duration pattern")
});

// Timeline steps with a positional duration: `tl.to(".box", 2, { x: 100 })`.
static TIMELINE_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(?:to|from|fromTo|staggerTo|staggerFrom|staggerFromTo)\(\s*[^,()]+,\s*(\d+(?:\.\d+)?)\s*,")
        .expect("valid timeline pattern")
});

// CSS shorthand that loops forever: `animation: spin 3s linear infinite`.
static INFINITE_ANIMATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"animation\s*:[^;{}]*?(\d+(?:\.\d+)?)(ms|s)\b[^;{}]*\binfinite\b|animation\s*:[^;{}]*\binfinite\b[^;{}]*?(\d+(?:\.\d+)?)(ms|s)\b")
        .expect("valid infinite pattern")
});

pub fn estimate_duration(script: &str) -> f64 {
    explicit_duration(script)
        .or_else(|| timeline_duration(script))
        .or_else(|| infinite_loop_duration(script))
        .unwrap_or_else(|| length_fallback(script.chars().count()))
}

fn explicit_duration(script: &str) -> Option<f64> {
    DURATION_PROPERTY
        .captures_iter(script)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .find(|d| *d > 0.0)
}

fn timeline_duration(script: &str) -> Option<f64> {
    TIMELINE_STEP
        .captures_iter(script)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .find(|d| *d > 0.0)
}

fn infinite_loop_duration(script: &str) -> Option<f64> {
    INFINITE_ANIMATION.captures_iter(script).find_map(|c| {
        let (value, unit) = match (c.get(1), c.get(2), c.get(3), c.get(4)) {
            (Some(v), Some(u), _, _) | (_, _, Some(v), Some(u)) => (v.as_str(), u.as_str()),
            _ => return None,
        };
        let value = value.parse::<f64>().ok()?;
        let seconds = if unit == "ms" { value / 1000.0 } else { value };
        (seconds > 0.0).then_some(seconds)
    })
}

fn length_fallback(len: usize) -> f64 {
    match len {
        0..1000 => 5.0,
        1000..2000 => 8.0,
        2000..3000 => 12.0,
        _ => 15.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_duration_property_wins() {
        assert_eq!(estimate_duration("gsap.to('.a', { x: 10, duration: 7 });"), 7.0);
        assert_eq!(estimate_duration("/* duration: 2.5 */"), 2.5);
    }

    #[test]
    fn duration_next_to_infinite_repeat() {
        let script = "gsap.to('.spinner', { rotation: 360, repeat: -1, ease: 'none', duration: 3 });";
        assert_eq!(estimate_duration(script), 3.0);
    }

    #[test]
    fn positional_timeline_duration() {
        let script = "var tl = new TimelineMax(); tl.to('.box', 4, { x: 100 }).to('.box', 1, { y: 50 });";
        assert_eq!(estimate_duration(script), 4.0);
    }

    #[test]
    fn css_infinite_animation() {
        assert_eq!(
            estimate_duration(".dot { animation: pulse 1500ms ease-in-out infinite; }"),
            1.5
        );
        assert_eq!(estimate_duration(".s { animation: infinite spin 6s linear; }"), 6.0);
    }

    #[test]
    fn zero_durations_fall_through() {
        let script = format!("gsap.set('.a', {{ duration: 0 }});{}", " ".repeat(1200));
        assert_eq!(estimate_duration(&script), 8.0);
    }

    #[test]
    fn length_breakpoints() {
        assert_eq!(estimate_duration(&"a".repeat(999)), 5.0);
        assert_eq!(estimate_duration(&"a".repeat(1500)), 8.0);
        assert_eq!(estimate_duration(&"a".repeat(2999)), 12.0);
        assert_eq!(estimate_duration(&"a".repeat(3000)), 15.0);
        assert_eq!(estimate_duration(""), 5.0);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 900 three-byte characters: 2700 bytes, still the shortest tier.
        assert_eq!(estimate_duration(&"動".repeat(900)), 5.0);
    }
}
