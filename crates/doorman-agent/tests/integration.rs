use doorman_core::{LockDevice, LockState, Reconciler, StatePublisher};
use doorman_proto::HomebridgeTopics;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

fn parse_mqtt_url(url: &str) -> (String, u16) {
    let url = url
        .strip_prefix("tcp://")
        .or_else(|| url.strip_prefix("mqtt://"))
        .unwrap_or(url);

    let parts: Vec<&str> = url.split(':').collect();

    let host = parts.first().copied().unwrap_or("localhost").to_string();
    let port = parts.get(1).and_then(|p| p.parse().ok()).unwrap_or(1883);

    (host, port)
}

async fn spawn_eventloop(mut eventloop: EventLoop) {
    loop {
        if eventloop.poll().await.is_err() {
            break;
        }
    }
}

struct BrokerPublisher {
    client: AsyncClient,
}

impl StatePublisher for BrokerPublisher {
    type Error = rumqttc::ClientError;

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), Self::Error> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
    }
}

struct NoopLock;

impl LockDevice for NoopLock {
    type Error = String;

    async fn lock(&self, _history_tag: &str) -> Result<(), String> {
        Ok(())
    }

    async fn unlock(&self, _history_tag: &str) -> Result<(), String> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_command_reaches_homebridge_topics() {
    if std::env::var("DOORMAN_INTEGRATION").is_err() {
        eprintln!("Skipping integration test; set DOORMAN_INTEGRATION=1 to run");
        return;
    }

    let broker = std::env::var("DOORMAN_MQTT_BROKER")
        .unwrap_or_else(|_| "tcp://localhost:1883".to_string());
    let (host, port) = parse_mqtt_url(&broker);

    let prefix = format!("doorman-it/{}", Uuid::new_v4());
    let topics = HomebridgeTopics::new(
        format!("{prefix}/set"),
        format!("{prefix}/target"),
        format!("{prefix}/current"),
    );

    let mut sub_opts = MqttOptions::new(format!("sub-{}", Uuid::new_v4()), host.clone(), port);
    sub_opts.set_keep_alive(Duration::from_secs(5));
    let (sub_client, mut sub_eventloop) = AsyncClient::new(sub_opts, 10);
    sub_client
        .subscribe(format!("{prefix}/+"), QoS::AtMostOnce)
        .await
        .unwrap();

    let (ready_tx, mut ready_rx) = mpsc::channel(1);
    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            match sub_eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    let _ = ready_tx.send(()).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).to_string();
                    if tx.send((publish.topic, payload)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    timeout(Duration::from_secs(5), ready_rx.recv())
        .await
        .expect("timeout waiting for subscription");

    let mut pub_opts = MqttOptions::new(format!("pub-{}", Uuid::new_v4()), host, port);
    pub_opts.set_keep_alive(Duration::from_secs(5));
    let (pub_client, pub_eventloop) = AsyncClient::new(pub_opts, 10);
    tokio::spawn(spawn_eventloop(pub_eventloop));

    let reconciler = Reconciler::new(BrokerPublisher { client: pub_client }, NoopLock, topics);
    reconciler.dispatch(b"S").await.unwrap();
    assert_eq!(reconciler.published_state().await, Some(LockState::Locked));

    let mut received = Vec::new();
    for _ in 0..3 {
        let message = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for message")
            .expect("subscriber stopped");
        received.push(message);
    }

    assert_eq!(
        received,
        vec![
            (format!("{prefix}/target"), "S".to_string()),
            (format!("{prefix}/target"), "S".to_string()),
            (format!("{prefix}/current"), "S".to_string()),
        ]
    );
}
