//! Visitor classification for hosted analytics: device class from the user
//! agent, traffic source from the referrer, new vs returning visitor.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceClass {
    /// Tablet markers win over mobile ones; an Android UA without "mobi" is a tablet.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();

        let android_tablet = ua
            .find("android")
            .is_some_and(|at| !ua[at..].contains("mobi"));
        if android_tablet || ["tablet", "ipad", "playbook", "silk"].iter().any(|m| ua.contains(m)) {
            return DeviceClass::Tablet;
        }

        const MOBILE_MARKERS: &[&str] = &[
            "mobile",
            "android",
            "iphone",
            "ipod",
            "iemobile",
            "blackberry",
            "kindle",
            "hpwos",
            "webos",
            "opera mobi",
            "opera mini",
        ];
        if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
            return DeviceClass::Mobile;
        }
        DeviceClass::Desktop
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Desktop => "Desktop",
            DeviceClass::Mobile => "Mobile",
            DeviceClass::Tablet => "Tablet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrafficSource {
    Direct,
    Organic,
    Social,
    Referral,
}

impl TrafficSource {
    pub fn from_referrer(referrer: Option<&str>) -> Self {
        let Some(referrer) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
            return TrafficSource::Direct;
        };
        let r = referrer.to_lowercase();
        if r.contains("google") || r.contains("bing") {
            TrafficSource::Organic
        } else if ["facebook", "instagram", "twitter"].iter().any(|s| r.contains(s)) {
            TrafficSource::Social
        } else {
            TrafficSource::Referral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficSource::Direct => "Direct",
            TrafficSource::Organic => "Organic",
            TrafficSource::Social => "Social",
            TrafficSource::Referral => "Referral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisitorKind {
    New,
    Returning,
}

impl VisitorKind {
    pub fn from_flag(returning: bool) -> Self {
        if returning {
            VisitorKind::Returning
        } else {
            VisitorKind::New
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisitorKind::New => "New",
            VisitorKind::Returning => "Returning",
        }
    }
}
