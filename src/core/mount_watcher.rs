/*
 * Background poller that turns changes in the volume monitor's state into
 * `VolumeEvent`s. The poller thread never touches application state; it only
 * hands events to the `publish` callback, which forwards them to the event
 * loop. When `publish` returns false (the loop has gone away) the thread ends.
 */
use crate::core::volume_monitor::{MonitorSnapshot, VolumeEvent, VolumeMonitorOperations};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/*
 * Takes one poll step: snapshots the monitor, publishes the events that lead
 * from `previous` to the new snapshot and stores the new snapshot. Returns
 * false as soon as `publish` rejects an event.
 */
pub fn poll_once<F>(
    monitor: &dyn VolumeMonitorOperations,
    previous: &mut MonitorSnapshot,
    publish: &mut F,
) -> bool
where
    F: FnMut(VolumeEvent) -> bool,
{
    let current = monitor.snapshot();
    for event in previous.diff(&current) {
        log::debug!("MountWatcher: Publishing {event:?}");
        if !publish(event) {
            return false;
        }
    }
    *previous = current;
    true
}

pub fn spawn_mount_poller<F>(
    monitor: Arc<dyn VolumeMonitorOperations>,
    interval: Duration,
    mut publish: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut(VolumeEvent) -> bool + Send + 'static,
{
    thread::Builder::new()
        .name("peony-mount-poller".to_string())
        .spawn(move || {
            let mut previous = monitor.snapshot();
            log::debug!(
                "MountWatcher: Started with {} mount(s), polling every {interval:?}",
                previous.mounts.len()
            );
            loop {
                thread::sleep(interval);
                if !poll_once(monitor.as_ref(), &mut previous, &mut publish) {
                    log::debug!("MountWatcher: Event receiver closed, stopping.");
                    break;
                }
            }
        })
}
