/// Runtime handle tests - driver task under paused tokio time
use messaging_core::clock::RuntimeClock;
use messaging_core::directory::{LocalUser, StaticDirectory};
use messaging_core::ids::SequentialIds;
use messaging_core::messenger_types::{DeliveryStatus, MessageKind, MessengerEvent, Participant};
use messaging_core::{MessagingConfig, MessagingError, SessionBootstrap, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn handle(config: MessagingConfig, bootstrap: SessionBootstrap) -> SessionHandle {
    let directory = StaticDirectory::new(vec![Participant {
        id: "usr_1".to_string(),
        display_name: "Alice".to_string(),
        title: "Engineer".to_string(),
        avatar: String::new(),
        online: false,
    }]);
    SessionHandle::start(
        LocalUser::new("me", "Me"),
        Arc::new(directory),
        bootstrap,
        config,
        Arc::new(RuntimeClock::new()),
        Box::new(SequentialIds::new()),
    )
    .unwrap()
}

fn quiet() -> MessagingConfig {
    MessagingConfig {
        typing_probability: 0.0,
        inbound_probability: 0.0,
        rng_seed: Some(5),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_driver_advances_delivery() {
    let handle = handle(quiet(), SessionBootstrap::default());
    let conv = handle.start_conversation("usr_1").await.unwrap();
    let id = handle
        .send_message(&conv, "Hi", MessageKind::Text)
        .await
        .unwrap();

    let status = |handle: SessionHandle, conv: String, id: String| async move {
        handle
            .messages(&conv)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.id == id)
            .and_then(|m| m.status)
    };

    assert_eq!(
        status(handle.clone(), conv.clone(), id.clone()).await,
        Some(DeliveryStatus::Sent)
    );

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        status(handle.clone(), conv.clone(), id.clone()).await,
        Some(DeliveryStatus::Delivered)
    );

    sleep(Duration::from_secs(2)).await;
    assert_eq!(
        status(handle.clone(), conv.clone(), id.clone()).await,
        Some(DeliveryStatus::Read)
    );

    handle.logout().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_events_reach_subscribers() {
    let handle = handle(quiet(), SessionBootstrap::default());
    let mut rx = handle.subscribe();
    let conv = handle.start_conversation("usr_1").await.unwrap();
    handle
        .send_message(&conv, "Hi", MessageKind::Text)
        .await
        .unwrap();

    let read = timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(MessengerEvent::StatusChanged {
                    status: DeliveryStatus::Read,
                    ..
                }) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await;
    assert_eq!(read, Ok(true));

    handle.logout().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_debounced_resize_through_driver() {
    let handle = handle(
        quiet(),
        SessionBootstrap {
            viewport_width: Some(1280),
            ..Default::default()
        },
    );
    handle.start_conversation("usr_1").await.unwrap();
    handle.viewport_resized(500).await.unwrap();
    assert!(!handle.view_state().await.unwrap().is_mobile);

    sleep(Duration::from_millis(250)).await;
    let view = handle.view_state().await.unwrap();
    assert!(view.is_mobile);
    assert!(!view.show_conversation_list);

    assert!(handle.handle_mobile_back().await.unwrap());
    let view = handle.view_state().await.unwrap();
    assert!(view.show_conversation_list);
    assert_eq!(view.active_conversation_id, None);

    handle.logout().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_logout_closes_handle() {
    let handle = handle(
        MessagingConfig {
            inbound_probability: 1.0,
            ..quiet()
        },
        SessionBootstrap {
            online: vec!["usr_1".to_string()],
            ..Default::default()
        },
    );
    handle.start_conversation("usr_1").await.unwrap();
    sleep(Duration::from_secs(4)).await;
    assert_eq!(handle.total_unread().await.unwrap(), 1);

    handle.logout().await.unwrap();
    assert_eq!(handle.total_unread().await, Err(MessagingError::SessionClosed));
    assert_eq!(
        handle.start_conversation("usr_1").await,
        Err(MessagingError::SessionClosed)
    );
    assert_eq!(handle.logout().await, Err(MessagingError::SessionClosed));
}
