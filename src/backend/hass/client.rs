use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::backend::hass::HassConnection;
use crate::backend::hass::auth::{AuthError, HassAuth};
use crate::error::{ApiError, ApiResult};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HassState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Entity id to current state, for every entity Home Assistant knows.
pub type HassEntities = BTreeMap<String, HassState>;

#[derive(Debug, Deserialize)]
struct HassWsEventEnvelope {
    #[serde(default)]
    pub event_type: String,
    pub data: HassWsEventData,
}

#[derive(Debug, Deserialize)]
struct HassWsEventData {
    pub entity_id: String,
    pub new_state: Option<HassState>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum HassWsIncoming {
    #[serde(rename = "auth_required")]
    AuthRequired,
    #[serde(rename = "auth_ok")]
    AuthOk,
    #[serde(rename = "auth_invalid")]
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "result")]
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
    #[serde(rename = "event")]
    Event { event: HassWsEventEnvelope },
    #[serde(other)]
    Other,
}

/// Local mirror of the entity states, fed by the initial `get_states`
/// reply and every later `state_changed` event.
#[derive(Debug, Default)]
struct StateCache {
    states: HassEntities,
}

impl StateCache {
    fn replace_all(&mut self, states: Vec<HassState>) {
        self.states = states
            .into_iter()
            .map(|st| (st.entity_id.clone(), st))
            .collect();
    }

    fn apply(&mut self, event: HassWsEventEnvelope) -> bool {
        if event.event_type != "state_changed" {
            return false;
        }
        match event.data.new_state {
            Some(state) => {
                self.states.insert(event.data.entity_id, state);
            }
            None => {
                self.states.remove(&event.data.entity_id);
            }
        }
        true
    }
}

struct Request {
    msg: Map<String, Value>,
    reply: oneshot::Sender<ApiResult<Value>>,
}

/// Home Assistant WebSocket session.
///
/// The socket is owned by a background task; handles are cheap clones
/// talking to it over channels. Once the socket goes away, the
/// `connected` channel flips to `false` and requests fail.
#[derive(Clone, Debug)]
pub struct WsConnection {
    requests: mpsc::UnboundedSender<Request>,
    entities: watch::Receiver<HassEntities>,
    connected: watch::Receiver<bool>,
}

struct WsWorker {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<ApiResult<Value>>>,
    cache: StateCache,
    entities: watch::Sender<HassEntities>,
    connected: watch::Sender<bool>,
}

const GET_STATES_ID: u64 = 1;
const SUBSCRIBE_ID: u64 = 2;

fn ws_endpoint_url(base_url: &Url) -> ApiResult<Url> {
    let unusable = || {
        ApiError::service_error(format!(
            "Failed to convert Home Assistant url {base_url} for websocket"
        ))
    };

    let mut base = base_url.clone();
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        base.path_segments_mut().map_err(|()| unusable())?.push("");
    }

    let mut url = base.join("api/websocket")?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).map_err(|()| unusable())?;
    Ok(url)
}

impl WsConnection {
    pub async fn connect(auth: &HassAuth) -> ApiResult<Self> {
        let ws_url = ws_endpoint_url(&auth.hass_url)?;
        log::info!("Connecting to Home Assistant websocket at {ws_url}");

        let (mut socket, _response) = connect_async(ws_url.as_str()).await?;

        // Wait for the auth challenge, answer it, and wait for the verdict.
        loop {
            match Self::recv_handshake(&mut socket).await? {
                HassWsIncoming::AuthRequired => {
                    let auth = json!({
                        "type": "auth",
                        "access_token": auth.access_token,
                    });
                    socket.send(Message::Text(auth.to_string().into())).await?;
                }
                HassWsIncoming::AuthOk => break,
                HassWsIncoming::AuthInvalid { message } => {
                    log::error!(
                        "Home Assistant websocket auth failed: {}",
                        message.unwrap_or_default()
                    );
                    return Err(AuthError::InvalidAuth.into());
                }
                _ => {}
            }
        }

        let get_states = json!({"id": GET_STATES_ID, "type": "get_states"});
        socket
            .send(Message::Text(get_states.to_string().into()))
            .await?;

        let subscribe = json!({
            "id": SUBSCRIBE_ID,
            "type": "subscribe_events",
            "event_type": "state_changed",
        });
        socket
            .send(Message::Text(subscribe.to_string().into()))
            .await?;

        let (requests, rx) = mpsc::unbounded_channel();
        let (entities_tx, entities) = watch::channel(HassEntities::new());
        let (connected_tx, connected) = watch::channel(true);

        let worker = WsWorker {
            socket,
            next_id: SUBSCRIBE_ID + 1,
            pending: HashMap::new(),
            cache: StateCache::default(),
            entities: entities_tx,
            connected: connected_tx,
        };
        tokio::spawn(worker.run(rx));

        Ok(Self {
            requests,
            entities,
            connected,
        })
    }

    async fn recv_handshake(
        socket: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> ApiResult<HassWsIncoming> {
        loop {
            let Some(msg) = socket.next().await else {
                return Err(ApiError::service_error(
                    "Home Assistant websocket closed during auth".to_string(),
                ));
            };
            if let Message::Text(text) = msg? {
                return Ok(serde_json::from_str(&text)?);
            }
        }
    }

    async fn request(&self, msg: Map<String, Value>) -> ApiResult<Value> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request { msg, reply })
            .map_err(|_| ApiError::ConnectionClosed)?;
        rx.await.map_err(|_| ApiError::ConnectionClosed)?
    }
}

#[async_trait]
impl HassConnection for WsConnection {
    fn subscribe_entities(&self) -> watch::Receiver<HassEntities> {
        self.entities.clone()
    }

    fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Map<String, Value>,
    ) -> ApiResult<Value> {
        let mut msg = Map::new();
        msg.insert("type".to_string(), Value::from("call_service"));
        msg.insert("domain".to_string(), Value::from(domain));
        msg.insert("service".to_string(), Value::from(service));
        msg.insert("service_data".to_string(), Value::Object(data));
        self.request(msg).await
    }
}

impl WsWorker {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        loop {
            tokio::select! {
                req = requests.recv() => {
                    let Some(req) = req else {
                        log::debug!("All Home Assistant handles dropped, closing websocket");
                        let _ = self.socket.close(None).await;
                        break;
                    };
                    if let Err(err) = self.send_request(req).await {
                        log::warn!("Home Assistant websocket send failed: {err}");
                        break;
                    }
                }
                msg = self.socket.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Home Assistant websocket closed");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            log::warn!("Home Assistant websocket error: {err}");
                            break;
                        }
                    }
                }
            }
        }

        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(ApiError::ConnectionClosed));
        }
        self.connected.send_replace(false);
    }

    async fn send_request(&mut self, req: Request) -> ApiResult<()> {
        let Request { mut msg, reply } = req;
        let id = self.next_id;
        self.next_id += 1;

        msg.insert("id".to_string(), Value::from(id));
        self.socket
            .send(Message::Text(Value::Object(msg).to_string().into()))
            .await?;
        self.pending.insert(id, reply);
        Ok(())
    }

    fn handle_text(&mut self, text: &str) {
        let msg = match serde_json::from_str::<HassWsIncoming>(text) {
            Ok(msg) => msg,
            Err(err) => {
                log::debug!("Ignoring unparsable Home Assistant message: {err}");
                return;
            }
        };

        match msg {
            HassWsIncoming::Result {
                id: GET_STATES_ID,
                success,
                result,
                error,
            } => {
                if !success {
                    log::error!(
                        "Home Assistant get_states failed: {}",
                        error.unwrap_or(Value::Null)
                    );
                    return;
                }
                match serde_json::from_value(result.unwrap_or(Value::Null)) {
                    Ok(states) => {
                        self.cache.replace_all(states);
                        self.publish();
                    }
                    Err(err) => log::error!("Invalid get_states reply: {err}"),
                }
            }
            HassWsIncoming::Result {
                id: SUBSCRIBE_ID,
                success,
                error,
                ..
            } => {
                if !success {
                    log::error!(
                        "Home Assistant subscribe_events failed: {}",
                        error.unwrap_or(Value::Null)
                    );
                }
            }
            HassWsIncoming::Result {
                id,
                success,
                result,
                error,
            } => {
                let Some(reply) = self.pending.remove(&id) else {
                    return;
                };
                let res = if success {
                    Ok(result.unwrap_or(Value::Null))
                } else {
                    Err(ApiError::service_error(format!(
                        "Home Assistant request failed: {}",
                        error.unwrap_or(Value::Null)
                    )))
                };
                let _ = reply.send(res);
            }
            HassWsIncoming::Event { event } => {
                if self.cache.apply(event) {
                    self.publish();
                }
            }
            _ => {}
        }
    }

    fn publish(&self) {
        self.entities.send_replace(self.cache.states.clone());
    }
}
