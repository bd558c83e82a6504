//! [`Transport`] over the D-Bus session bus (zbus 3.x, tokio).

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use zbus::{
    fdo::DBusProxy,
    names::BusName,
    zvariant::{OwnedValue, StructureBuilder, Value as ZValue},
    Connection, Message, Proxy,
};

use crate::{
    error::{CallError, ConnectError},
    transport::{NotificationSink, Subscription, Transport, MPRIS_PREFIX},
    value::Value,
};

/// Preferred when no specific player is configured: playerctld proxies
/// whichever player was most recently active.
const PLAYERCTLD: &str = "org.mpris.MediaPlayer2.playerctld";

#[derive(Debug, Clone)]
pub struct DbusTransport {
    connection: Connection,
}

/// A proxy bound to a resolved bus name.
#[derive(Debug, Clone)]
pub struct DbusHandle {
    proxy: Proxy<'static>,
}

impl DbusTransport {
    pub async fn session() -> Result<Self, ConnectError> {
        let connection = Connection::session().await.map_err(bus_error)?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl Transport for DbusTransport {
    type Handle = DbusHandle;

    async fn resolve(&self, service: Option<&str>) -> Result<String, ConnectError> {
        let dbus = DBusProxy::new(&self.connection).await.map_err(bus_error)?;
        match service {
            Some(name) => {
                let bus = BusName::try_from(name).map_err(bus_error)?;
                if dbus.name_has_owner(bus).await.map_err(fdo_error)? {
                    Ok(name.to_owned())
                } else {
                    Err(ConnectError::ServiceUnavailable(name.to_owned()))
                }
            }
            None => {
                let mut players: Vec<String> = dbus
                    .list_names()
                    .await
                    .map_err(fdo_error)?
                    .iter()
                    .map(|n| n.as_str().to_owned())
                    .filter(|n| n.starts_with(MPRIS_PREFIX))
                    .collect();
                players.sort();
                if players.iter().any(|n| n == PLAYERCTLD) {
                    return Ok(PLAYERCTLD.to_owned());
                }
                players.into_iter().next().ok_or(ConnectError::NoService)
            }
        }
    }

    async fn connect(
        &self,
        service: &str,
        path: &str,
        interface: &str,
    ) -> Result<DbusHandle, ConnectError> {
        let proxy = Proxy::new(
            &self.connection,
            service.to_owned(),
            path.to_owned(),
            interface.to_owned(),
        )
        .await
        .map_err(bus_error)?;
        debug!("dbus: proxy for {service} {interface}");
        Ok(DbusHandle { proxy })
    }

    async fn call(
        &self,
        handle: &DbusHandle,
        method: &str,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let body = if args.is_empty() {
            None
        } else {
            let fields = args.iter().map(to_zvalue).collect::<Result<Vec<_>, _>>()?;
            Some(
                fields
                    .into_iter()
                    .fold(StructureBuilder::new(), |b, v| b.append_field(v))
                    .build(),
            )
        };
        let call = async {
            match &body {
                None => handle.proxy.call_method(method, &()).await,
                Some(body) => handle.proxy.call_method(method, body).await,
            }
        };
        let reply = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| CallError::Timeout(timeout))?
            .map_err(call_error)?;
        decode_reply(&reply)
    }

    async fn subscribe(
        &self,
        handle: &DbusHandle,
        signal: &str,
        path: &str,
        sink: NotificationSink,
    ) -> Result<Subscription, ConnectError> {
        let subscribe_error = |e: zbus::Error| ConnectError::Subscribe {
            signal: signal.to_owned(),
            message: e.to_string(),
        };
        let mut stream = handle
            .proxy
            .receive_signal(signal.to_owned())
            .await
            .map_err(subscribe_error)?;
        let path = path.to_owned();
        let task = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let on_path = msg.path().map_or(true, |p| p.as_str() == path);
                if on_path && !sink.notify() {
                    break;
                }
            }
        });
        Ok(Subscription::from_task(task))
    }
}

fn bus_error<E: std::fmt::Display>(e: E) -> ConnectError {
    ConnectError::Bus(e.to_string())
}

fn fdo_error(e: zbus::fdo::Error) -> ConnectError {
    ConnectError::Bus(e.to_string())
}

fn call_error(e: zbus::Error) -> CallError {
    match e {
        zbus::Error::MethodError(name, detail, _) => CallError::Remote(match detail {
            Some(detail) => format!("{name}: {detail}"),
            None => name.to_string(),
        }),
        zbus::Error::Variant(e) => CallError::MalformedReply(e.to_string()),
        zbus::Error::FDO(e) => CallError::Remote(e.to_string()),
        other => CallError::Remote(other.to_string()),
    }
}

/// Void returns carry no SIGNATURE header field at all.
fn decode_reply(reply: &Message) -> Result<Value, CallError> {
    match reply.body_signature() {
        Ok(signature) if signature.is_empty() => return Ok(Value::Unit),
        Ok(_) => {}
        Err(zbus::Error::NoBodySignature) => return Ok(Value::Unit),
        Err(e) => return Err(call_error(e)),
    }
    let body: OwnedValue = reply.body().map_err(call_error)?;
    Ok(from_zvalue(body.into()))
}

fn to_zvalue(value: &Value) -> Result<ZValue<'static>, CallError> {
    Ok(match value {
        Value::Bool(b) => ZValue::from(*b),
        Value::I64(i) => ZValue::from(*i),
        Value::U64(u) => ZValue::from(*u),
        Value::F64(f) => ZValue::from(*f),
        Value::Str(s) => ZValue::from(s.clone()),
        Value::StrList(v) => ZValue::from(v.clone()),
        Value::Unit | Value::List(_) | Value::Dict(_) => {
            return Err(CallError::UnsupportedArgument(value.kind()))
        }
    })
}

fn from_zvalue(value: ZValue<'_>) -> Value {
    match value {
        ZValue::Bool(v) => Value::Bool(v),
        ZValue::I16(v) => Value::I64(i64::from(v)),
        ZValue::I32(v) => Value::I64(i64::from(v)),
        ZValue::I64(v) => Value::I64(v),
        ZValue::U8(v) => Value::U64(u64::from(v)),
        ZValue::U16(v) => Value::U64(u64::from(v)),
        ZValue::U32(v) => Value::U64(u64::from(v)),
        ZValue::U64(v) => Value::U64(v),
        ZValue::F64(v) => Value::F64(v),
        ZValue::Str(v) => Value::Str(v.to_string()),
        ZValue::ObjectPath(v) => Value::Str(v.to_string()),
        ZValue::Signature(v) => Value::Str(v.to_string()),
        ZValue::Value(v) => from_zvalue(*v),
        ZValue::Array(a) => {
            let items: Vec<Value> = a.iter().cloned().map(from_zvalue).collect();
            if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Str(_))) {
                Value::StrList(
                    items
                        .into_iter()
                        .filter_map(|v| match v {
                            Value::Str(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            } else {
                Value::List(items)
            }
        }
        ZValue::Dict(d) => match HashMap::<String, ZValue<'_>>::try_from(d) {
            Ok(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (k, from_zvalue(v)))
                    .collect(),
            ),
            Err(_) => Value::List(Vec::new()),
        },
        _ => Value::Unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_variants_are_unwrapped() {
        let v = ZValue::Value(Box::new(ZValue::from("Playing")));
        assert_eq!(from_zvalue(v), Value::Str("Playing".to_owned()));
    }

    #[test]
    fn string_arrays_become_string_lists() {
        let v = ZValue::from(vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(
            from_zvalue(v),
            Value::StrList(vec!["a".to_owned(), "b".to_owned()])
        );
    }

    fn call() -> Message {
        Message::method(
            Some(":1.42"),
            Some("org.mpris.MediaPlayer2.mock"),
            "/org/mpris/MediaPlayer2",
            Some("org.mpris.MediaPlayer2.Player"),
            "PlayPause",
            &(),
        )
        .unwrap()
    }

    #[test]
    fn void_reply_decodes_as_unit() {
        let reply = Message::method_reply(None::<&str>, &call(), &()).unwrap();
        assert_eq!(decode_reply(&reply), Ok(Value::Unit));
    }

    #[test]
    fn compound_arguments_are_rejected() {
        assert_eq!(
            to_zvalue(&Value::Unit),
            Err(CallError::UnsupportedArgument("unit"))
        );
        assert!(matches!(
            to_zvalue(&Value::List(Vec::new())),
            Err(CallError::UnsupportedArgument(_))
        ));
        assert_eq!(
            to_zvalue(&Value::from("Position")),
            Ok(ZValue::from("Position"))
        );
    }

    #[test]
    fn widths_are_normalised() {
        assert_eq!(from_zvalue(ZValue::U32(7)), Value::U64(7));
        assert_eq!(from_zvalue(ZValue::I32(-7)), Value::I64(-7));
    }
}
