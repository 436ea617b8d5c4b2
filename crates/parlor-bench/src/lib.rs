//! Shared setup for Parlor benchmarks.

use parlor_core::{trace, ClientId, Hub, HubConfig, HubHandle};

/// Start a hub with `members` registered members whose outboxes are
/// drained in the background.
///
/// Must be called from within a Tokio runtime.
pub async fn room(members: usize, outbox_capacity: usize) -> HubHandle {
    let config = HubConfig {
        outbox_capacity,
        ..HubConfig::default()
    };
    let hub = Hub::spawn(config, trace::off());

    for i in 0..members {
        let (outbox, mut rx) = hub.outbox();
        hub.register(ClientId::next(), format!("member-{}", i), outbox)
            .await
            .expect("hub stopped during setup");
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
    }

    hub
}
