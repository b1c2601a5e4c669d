//! JSON requests received on the command topic and the replies published for them

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{controller::DoorController, state::Action, stats::Statistic};
use crate::{
  alert::AlertSink,
  error::{ErrorKind, GarageError, GarageResult},
  gateway::DeviceGateway,
};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum Request {
  Operate,
  Open,
  Close,
  ResetOpenCounter,
  ResetCloseCounter,
  Lock,
  Unlock,
  State,
  Stats,
  ResetStats,
  Statistic {
    action: Action,
    statistic: Statistic,
  },
  Logs {
    #[serde(rename = "startIndex", default)]
    start_index: Option<usize>,
    #[serde(rename = "pageSize", default)]
    page_size: Option<usize>,
  },
  DurationLogs {
    #[serde(rename = "startIndex", default)]
    start_index: Option<usize>,
    #[serde(rename = "pageSize", default)]
    page_size: Option<usize>,
    #[serde(default)]
    filter: Option<Action>,
  },
  ReferenceDuration {
    action: Action,
  },
  SetReferenceDuration {
    action: Action,
    time: i64,
  },
}

impl Request {
  /// True for requests that can move the door or change what's stored
  pub fn is_command(&self) -> bool {
    !matches!(
      self,
      Request::State
        | Request::Stats
        | Request::Statistic { .. }
        | Request::Logs { .. }
        | Request::DurationLogs { .. }
        | Request::ReferenceDuration { .. }
    )
  }
}

#[derive(Debug, Deserialize)]
struct Correlation {
  #[serde(default)]
  id: Option<Value>,
}

/// A decoded request plus the caller's correlation id, if any
#[derive(Debug)]
pub struct Envelope {
  pub id: Option<Value>,
  pub request: Request,
}

pub fn decode(payload: &str) -> GarageResult<Envelope> {
  let request = serde_json::from_str::<Request>(payload).map_err(GarageError::MalformedRequest)?;
  let correlation = serde_json::from_str::<Correlation>(payload).map_err(GarageError::MalformedRequest)?;
  Ok(Envelope {
    id: correlation.id,
    request,
  })
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Reply {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<Value>,
  pub ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind: Option<ErrorKind>,
}

impl Reply {
  pub fn new(id: Option<Value>, result: &GarageResult<Value>) -> Self {
    match result {
      Ok(body) => Reply {
        id,
        ok: true,
        body: Some(body.clone()).filter(|body| !body.is_null()),
        error: None,
        kind: None,
      },
      Err(e) => Reply {
        id,
        ok: false,
        body: None,
        error: Some(e.to_string()),
        kind: Some(e.kind()),
      },
    }
  }
}

impl<G: DeviceGateway, A: AlertSink + ?Sized + 'static> DoorController<G, A> {
  /// Run `request`, returning its JSON body
  pub async fn handle(&self, request: Request) -> GarageResult<Value> {
    let body = match request {
      Request::Operate => {
        self.operate().await?;
        Value::Null
      }
      Request::Open => serde_json::to_value(self.open().await?)?,
      Request::Close => serde_json::to_value(self.close().await?)?,
      Request::ResetOpenCounter => {
        self.reset_open_counter().await?;
        Value::Null
      }
      Request::ResetCloseCounter => {
        self.reset_close_counter().await?;
        Value::Null
      }
      Request::Lock => {
        self.lock();
        Value::Null
      }
      Request::Unlock => {
        self.unlock();
        Value::Null
      }
      Request::State => serde_json::to_value(self.state_response().await?)?,
      Request::Stats => serde_json::to_value(self.stats().await?)?,
      Request::ResetStats => serde_json::json!({ "since": self.reset_stats().await? }),
      Request::Statistic { action, statistic } => Value::from(self.statistic(action, statistic).await?),
      Request::Logs {
        start_index,
        page_size,
      } => serde_json::to_value(self.logs(start_index, page_size).await)?,
      Request::DurationLogs {
        start_index,
        page_size,
        filter,
      } => serde_json::to_value(self.duration_logs(start_index, page_size, filter).await)?,
      Request::ReferenceDuration { action } => serde_json::to_value(self.reference_duration(action).await?)?,
      Request::SetReferenceDuration { action, time } => {
        serde_json::to_value(self.set_reference_duration(action, time).await?)?
      }
    };

    Ok(body)
  }
}
