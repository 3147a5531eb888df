//! Process-wide shutdown signal

use tokio::sync::watch;

/// Create a shutdown flag shared by every listener
#[must_use]
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once the shutdown flag is set or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn pending_until_flag_set() {
        let (tx, mut rx) = channel();
        let mut waiter = tokio_test::task::spawn(wait_for_shutdown(&mut rx));

        tokio_test::assert_pending!(waiter.poll());
        tx.send_replace(false);
        tokio_test::assert_pending!(waiter.poll());

        tx.send_replace(true);
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn resolves_when_flag_set() {
        let (tx, mut rx) = channel();
        let waiter = tokio::spawn(async move { wait_for_shutdown(&mut rx).await });

        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_when_sender_dropped() {
        let (tx, mut rx) = channel();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn already_set_resolves_immediately() {
        let (tx, mut rx) = channel();
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }
}
