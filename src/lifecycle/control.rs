//! Control loop: turns keep-alive, interrupt and idle-expiry stimuli into a
//! single shutdown trigger

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::idle::{IdleDeadline, IdleMonitor};
use crate::domain::{ControlEvent, ShutdownReason};

/// Creates the control channel
pub fn channel() -> (mpsc::Sender<ControlEvent>, mpsc::Receiver<ControlEvent>) {
    mpsc::channel(16)
}

/// Bridges process signals into the control channel: SIGUSR1 is a keep-alive,
/// SIGINT and SIGTERM are interrupts.
pub fn spawn_signal_listener(
    events: mpsc::Sender<ControlEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let mut keep_alive = signal(SignalKind::user_defined1())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = keep_alive.recv() => ControlEvent::KeepAlive,
                _ = interrupt.recv() => ControlEvent::Interrupt,
                _ = terminate.recv() => ControlEvent::Interrupt,
            };

            if events.send(event).await.is_err() {
                break;
            }
        }
    }))
}

/// Runs until something asks the gateway to stop.
///
/// Keep-alive events reset the idle deadline. The first interrupt or the idle
/// expiry ends the loop; later events stay queued in `events` for the
/// shutdown sequencer.
pub async fn wait_for_trigger(
    events: &mut mpsc::Receiver<ControlEvent>,
    idle: &IdleDeadline,
    monitor: &mut IdleMonitor,
) -> ShutdownReason {
    let mut events_open = true;

    loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(ControlEvent::KeepAlive) => {
                    info!("Received keep-alive, resetting idle deadline");
                    idle.reset();
                }
                Some(ControlEvent::Interrupt) => {
                    info!("Received interrupt, shutting down gracefully");
                    return ShutdownReason::OperatorInterrupt;
                }
                None => events_open = false,
            },
            _ = monitor.expired() => {
                info!(max_idle = ?idle.max_idle(), "Idle deadline reached without build traffic, shutting down");
                return ShutdownReason::IdleTimeout;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_expiry_triggers_shutdown() {
        let (_tx, mut rx) = channel();
        let (idle, mut monitor) = IdleDeadline::new(Duration::from_secs(600));

        let reason = wait_for_trigger(&mut rx, &idle, &mut monitor).await;

        assert_eq!(reason, ShutdownReason::IdleTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_triggers_shutdown() {
        let (tx, mut rx) = channel();
        let (idle, mut monitor) = IdleDeadline::new(Duration::from_secs(600));

        tx.send(ControlEvent::Interrupt).await.unwrap();
        let reason = wait_for_trigger(&mut rx, &idle, &mut monitor).await;

        assert_eq!(reason, ShutdownReason::OperatorInterrupt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_postpones_expiry() {
        let (tx, mut rx) = channel();
        let (idle, mut monitor) = IdleDeadline::new(Duration::from_secs(10));
        let start = tokio::time::Instant::now();

        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_secs(8)).await;
                tx.send(ControlEvent::KeepAlive).await.unwrap();
            }
            // Keep the channel open past the deadline.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let reason = wait_for_trigger(&mut rx, &idle, &mut monitor).await;

        assert_eq!(reason, ShutdownReason::IdleTimeout);
        assert!(start.elapsed() >= Duration::from_secs(34));
    }

    #[tokio::test]
    async fn test_signals_map_to_control_events() {
        use nix::sys::signal::{raise, Signal};

        let (tx, mut rx) = channel();
        let listener = spawn_signal_listener(tx).unwrap();

        for (signal, expected) in [
            (Signal::SIGUSR1, ControlEvent::KeepAlive),
            (Signal::SIGTERM, ControlEvent::Interrupt),
            (Signal::SIGINT, ControlEvent::Interrupt),
        ] {
            raise(signal).unwrap();
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("signal not delivered");
            assert_eq!(event, Some(expected), "{:?}", signal);
        }

        listener.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_still_expires() {
        let (tx, mut rx) = channel();
        drop(tx);
        let (idle, mut monitor) = IdleDeadline::new(Duration::from_secs(10));

        let reason = wait_for_trigger(&mut rx, &idle, &mut monitor).await;

        assert_eq!(reason, ShutdownReason::IdleTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_interrupt_left_for_sequencer() {
        let (tx, mut rx) = channel();
        let (idle, mut monitor) = IdleDeadline::new(Duration::from_secs(10));

        tx.send(ControlEvent::Interrupt).await.unwrap();
        tx.send(ControlEvent::Interrupt).await.unwrap();
        wait_for_trigger(&mut rx, &idle, &mut monitor).await;

        assert_eq!(rx.try_recv().unwrap(), ControlEvent::Interrupt);
    }
}
