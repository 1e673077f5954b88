// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handshake-gated channel ends
//!
//! [HandshakeParent] probes the child until it answers, then marks the
//! channel connected. Requests issued before then wait for the connection
//! up to their own deadline. [HandshakeChild] answers probes and holds
//! back requests until the parent completes the handshake.

use strum::Display;

pub use frame_signer_proto::handshake::{
    HandshakeFromChild, HandshakeFromParent, HandshakeOptions, HandshakePayload,
};

mod parent;
pub use parent::HandshakeParent;

mod child;
pub use child::HandshakeChild;

/// Handshake progress for one channel end
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum HandshakeState {
    NotStarted,
    InProgress,
    Connected,
}

/// Event name of the child's handshake answer
pub const HANDSHAKE_RESPONSE: &str = "handshakeResponse";

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use frame_signer_proto::frame::{FrameRequest, FrameResponse, PublicKeyResponse};

    use super::*;
    use crate::{
        transport::{
            memory::{window_pair, MemoryWindow},
            MessageEvent, WindowTransport,
        },
        Error, SendActionOptions, TargetOrigin, Transport,
    };

    type Memory = WindowTransport<MemoryWindow>;

    fn transports() -> (Arc<Memory>, Arc<Memory>) {
        let (p, c) = window_pair("https://app.example", "https://signer.example");

        (
            Arc::new(WindowTransport::new(
                p,
                TargetOrigin::Exact("https://signer.example".into()),
            )),
            Arc::new(WindowTransport::new(
                c,
                TargetOrigin::Exact("https://app.example".into()),
            )),
        )
    }

    /// Spawn a child, returning once it is listening for probes
    async fn serve(t: Arc<Memory>) -> tokio::task::JoinHandle<()> {
        let listeners = t.listener_count();
        let child =
            HandshakeChild::<FrameRequest, FrameResponse, _>::new(t.clone(), Default::default())
                .unwrap();

        let task = tokio::spawn(async move {
            child
                .serve(|r| match r {
                    Ok(FrameRequest::GetPublicKey) => {
                        Some(FrameResponse::PublicKey(PublicKeyResponse {
                            public_key: "11111111111111111111111111111111".into(),
                        }))
                    }
                    _ => None,
                })
                .await
        });

        // Handshake and request subscriptions
        while t.listener_count() < listeners + 2 {
            tokio::task::yield_now().await;
        }

        task
    }

    /// Count handshake probes seen by the child transport
    fn count_probes(t: &Arc<Memory>) -> Arc<AtomicUsize> {
        let n = Arc::new(AtomicUsize::new(0));
        let c = n.clone();
        t.add_message_listener(Arc::new(move |e: &MessageEvent| {
            if e.data["event"] == "handshakeRequest" {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));
        n
    }

    #[tokio::test]
    async fn handshake_then_request() {
        let (p, c) = transports();
        let _child = serve(c).await;

        let parent =
            HandshakeParent::<FrameResponse, FrameRequest, _>::new(p, Default::default()).unwrap();
        assert_eq!(parent.state(), HandshakeState::NotStarted);
        assert_eq!(parent.send(&FrameRequest::GetPublicKey), Err(Error::NotConnected));

        parent.handshake_with_child().await.unwrap();
        assert!(parent.is_connected());

        let r = parent
            .send_action(
                &FrameRequest::GetPublicKey,
                "response:get-public-key",
                Default::default(),
            )
            .await
            .unwrap();
        assert!(matches!(r, FrameResponse::PublicKey(_)));
    }

    #[tokio::test]
    async fn request_waits_for_handshake() {
        let (p, c) = transports();
        let _child = serve(c).await;

        let parent =
            HandshakeParent::<FrameResponse, FrameRequest, _>::new(p, Default::default()).unwrap();

        // Issue the request first, then connect
        let pending = {
            let parent = parent.clone();
            tokio::spawn(async move {
                parent
                    .send_action(
                        &FrameRequest::GetPublicKey,
                        "response:get-public-key",
                        Default::default(),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        parent.handshake_with_child().await.unwrap();

        let r = pending.await.unwrap().unwrap();
        assert!(matches!(r, FrameResponse::PublicKey(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn request_without_handshake_times_out() {
        let (p, c) = transports();
        let _child = serve(c).await;

        let parent =
            HandshakeParent::<FrameResponse, FrameRequest, _>::new(p, Default::default()).unwrap();

        let r = parent
            .send_action(
                &FrameRequest::GetPublicKey,
                "response:get-public-key",
                SendActionOptions::default().with_timeout(Duration::from_secs(2)),
            )
            .await;
        assert_eq!(r, Err(Error::HandshakeTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_timeout_without_child() {
        let (p, c) = transports();
        let probes = count_probes(&c);

        let parent = HandshakeParent::<FrameResponse, FrameRequest, _>::new(
            p,
            HandshakeOptions {
                timeout: Duration::from_secs(10),
                interval: Duration::from_secs(3),
            },
        )
        .unwrap();

        assert_eq!(
            parent.handshake_with_child().await,
            Err(Error::HandshakeTimeout)
        );
        assert_eq!(parent.state(), HandshakeState::NotStarted);

        // Probes at 0, 3, 6 and 9 seconds
        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn concurrent_handshakes_single_exchange() {
        let (p, c) = transports();
        let probes = count_probes(&c);
        let _child = serve(c).await;

        let parent =
            HandshakeParent::<FrameResponse, FrameRequest, _>::new(p, Default::default()).unwrap();

        let (a, b) = tokio::join!(parent.handshake_with_child(), parent.handshake_with_child());
        assert_eq!((a, b), (Ok(()), Ok(())));
        assert_eq!(probes.load(Ordering::SeqCst), 1);

        // Connected, no further exchange
        parent.handshake_with_child().await.unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rehandshake_after_reset() {
        let (p, c) = transports();
        let _child = serve(c).await;

        let parent =
            HandshakeParent::<FrameResponse, FrameRequest, _>::new(p, Default::default()).unwrap();

        parent.handshake_with_child().await.unwrap();
        parent.reset();
        assert!(!parent.is_connected());

        parent.handshake_with_child().await.unwrap();
        assert!(parent.is_connected());
    }
}
