use lazy_static::lazy_static;
use super::ViewportSpec;

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36";
const GALAXY_UA: &str = "Mozilla/5.0 (Linux; Android 13; SM-S901B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36";

fn mobile(width: u32, height: u32, scale: f64, user_agent: &str) -> ViewportSpec {
    ViewportSpec {
        width,
        height,
        scale,
        mobile: true,
        touch: true,
        user_agent: Some(user_agent.to_string()),
    }
}

lazy_static! {
    /// Built-in device descriptors
    static ref DEVICES: Vec<(&'static str, ViewportSpec)> = {
        let mut m = Vec::new();
        let mut add = |name: &'static str, spec: ViewportSpec| m.push((name, spec));
        add("iPhone SE", mobile(375, 667, 2.0, IPHONE_UA));
        add("iPhone 13", mobile(390, 844, 3.0, IPHONE_UA));
        add("iPhone 13 Pro Max", mobile(428, 926, 3.0, IPHONE_UA));
        add("iPhone 14", mobile(390, 844, 3.0, IPHONE_UA));
        add("iPad Mini", mobile(768, 1024, 2.0, IPAD_UA));
        add("iPad Pro 11", mobile(834, 1194, 2.0, IPAD_UA));
        add("Pixel 5", mobile(393, 851, 2.75, PIXEL_UA));
        add("Pixel 7", mobile(412, 915, 2.625, PIXEL_UA));
        add("Galaxy S22", mobile(360, 780, 3.0, GALAXY_UA));
        add("Desktop 1080p", ViewportSpec::desktop(1920, 1080, 1.0));
        add("Desktop HiDPI", ViewportSpec::desktop(1440, 900, 2.0));
        m
    };
}

/// Look up a device descriptor, ignoring case and surrounding whitespace.
pub fn lookup(name: &str) -> Option<(&'static str, ViewportSpec)> {
    let wanted = name.trim();
    DEVICES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(wanted))
        .map(|(known, spec)| (*known, spec.clone()))
}

pub fn names() -> Vec<&'static str> {
    DEVICES.iter().map(|(name, _)| *name).collect()
}
