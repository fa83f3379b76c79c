//! Connectivity status banner.

/// Shown when connectivity returns
pub const BACK_ONLINE: &str = "You're back online!";
/// Shown when connectivity is lost
pub const GONE_OFFLINE: &str = "You're offline. Some features may be limited.";
/// Shown when an action was queued for later
pub const ACTION_SAVED: &str = "Action saved. Will sync when online.";

/// Banner style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    /// Connected (auto-hides in the page)
    Online,
    /// Warning
    Offline,
}

/// The status banner currently shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: &'static str,
}

/// Tracks the page's view of connectivity and the banner to show.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: bool,
    banner: Option<Banner>,
}

impl Connectivity {
    /// Start in the given state. Starting offline shows the offline banner.
    pub fn new(online: bool) -> Self {
        let mut connectivity = Self {
            online: true,
            banner: None,
        };
        if !online {
            connectivity.go_offline();
        }
        connectivity
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.banner = None;
    }

    /// Returns `true` if this was a transition.
    pub fn go_offline(&mut self) -> bool {
        let changed = self.online;
        self.online = false;
        self.show(BannerKind::Offline, GONE_OFFLINE);
        changed
    }

    /// Returns `true` if this was a transition.
    pub fn go_online(&mut self) -> bool {
        let changed = !self.online;
        self.online = true;
        self.show(BannerKind::Online, BACK_ONLINE);
        changed
    }

    pub fn action_saved(&mut self) {
        self.show(BannerKind::Offline, ACTION_SAVED);
    }

    fn show(&mut self, kind: BannerKind, message: &'static str) {
        log::info!("{}", message);
        self.banner = Some(Banner { kind, message });
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
