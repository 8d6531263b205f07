use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardClick {
    /// First click: the guard is now armed and nothing was deleted.
    Armed,
    /// Second click inside the window: go ahead and delete.
    Confirmed,
}

/// Two-click confirmation for destructive actions.
///
/// Unarmed until clicked; stays armed for `window`, then quietly disarms.
/// The timer is a spawned sleep, so the guard must be clicked from inside a
/// tokio runtime.
#[derive(Debug)]
pub struct DeletionGuard {
    window: Duration,
    timer: Option<JoinHandle<()>>,
}

impl DeletionGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn click(&mut self) -> GuardClick {
        if self.is_armed() {
            self.disarm();
            GuardClick::Confirmed
        } else {
            self.arm();
            GuardClick::Armed
        }
    }

    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn arm(&mut self) {
        self.disarm();
        let window = self.window;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
        }));
    }
}

impl Drop for DeletionGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn single_click_only_arms() {
        let mut guard = DeletionGuard::new(WINDOW);
        assert!(!guard.is_armed());

        assert_eq!(guard.click(), GuardClick::Armed);
        assert!(guard.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn second_click_inside_window_confirms_and_disarms() {
        let mut guard = DeletionGuard::new(WINDOW);
        guard.click();

        tokio::time::sleep(WINDOW / 2).await;
        assert_eq!(guard.click(), GuardClick::Confirmed);
        assert!(!guard.is_armed());

        // The cycle starts over.
        assert_eq!(guard.click(), GuardClick::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_disarms_without_confirming() {
        let mut guard = DeletionGuard::new(WINDOW);
        guard.click();

        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert!(!guard.is_armed());

        // A late click counts as a first click again.
        assert_eq!(guard.click(), GuardClick::Armed);
        assert!(guard.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_cancels_the_timer() {
        let mut guard = DeletionGuard::new(WINDOW);
        guard.click();
        guard.disarm();

        assert!(!guard.is_armed());
        assert_eq!(guard.click(), GuardClick::Armed);
    }
}
