use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::params::*;
use super::protocol::{PARSE_ERROR, Request, Response, UNKNOWN_METHOD};
use crate::auth::Session;
use crate::config::Config;
use crate::database::{NewOperator, PersonKind, SearchFilter};
use crate::matcher::IdentityMatcher;
use crate::registry::RecordStore;
use crate::{RegistryError, Result};

/// Routes gateway requests to the session, record store and matcher
#[derive(Debug, Clone)]
pub struct Gateway {
    session: Arc<Session>,
    records: RecordStore,
    matcher: IdentityMatcher,
}

impl Gateway {
    #[inline]
    pub fn new(session: Arc<Session>, records: RecordStore, matcher: IdentityMatcher) -> Self {
        Self {
            session,
            records,
            matcher,
        }
    }

    #[inline]
    pub fn from_config(session: Arc<Session>, config: &Config) -> Self {
        Self::new(
            session,
            RecordStore::from_config(config),
            IdentityMatcher::from_config(&config.matcher),
        )
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serve requests from stdin until EOF
    #[inline]
    pub async fn serve_stdio(&self) -> anyhow::Result<()> {
        info!("Starting gateway on stdio");

        let reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(reader, &mut stdout).await
    }

    /// Answer each request line with one response line
    #[inline]
    pub async fn serve<R, W>(&self, mut reader: R, writer: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    info!("EOF reached, closing gateway");
                    break;
                }
                Ok(_) => {
                    let response = match std::str::from_utf8(&buf) {
                        Ok(line) => self.handle_line(line).await,
                        Err(e) => {
                            warn!("Request is not valid UTF-8: {}", e);
                            Some(Response::failure(
                                None,
                                PARSE_ERROR,
                                format!("Invalid request: {}", e),
                            ))
                        }
                    };
                    if let Some(response) = response {
                        send_response(writer, &response).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading request: {}", e);
                    break;
                }
            }
        }

        info!("Gateway stopped");
        Ok(())
    }

    /// Parse and handle one request line; blank lines produce no response
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<Request>(line) {
            Ok(request) => Some(self.handle(request).await),
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Some(Response::failure(
                    None,
                    PARSE_ERROR,
                    format!("Invalid request: {}", e),
                ))
            }
        }
    }

    #[inline]
    pub async fn handle(&self, request: Request) -> Response {
        debug!("Handling {}", request.method);

        match self.dispatch(&request.method, request.params).await {
            Ok(Some(data)) => Response::success(request.id, data),
            Ok(None) => {
                warn!("Unknown method: {}", request.method);
                Response::failure(
                    request.id,
                    UNKNOWN_METHOD,
                    format!("Unknown method: {}", request.method),
                )
            }
            Err(e) => {
                match e {
                    RegistryError::Connection(_)
                    | RegistryError::Database(_)
                    | RegistryError::Io(_)
                    | RegistryError::Other(_) => error!("{} failed: {}", request.method, e),
                    _ => debug!("{} rejected: {}", request.method, e),
                }
                Response::from_error(request.id, &e)
            }
        }
    }

    /// Run one method; `None` when the method does not exist
    #[inline]
    pub async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
        let session = self.session.as_ref();
        let records = &self.records;

        let data = match method {
            "db:login-operator" => {
                let p: LoginParams = parse(method, params)?;
                to_data(&self.session.login(&p.username, &p.password).await?)?
            }
            "db:logout" => {
                self.session.logout().await?;
                message("Logged out")
            }
            "db:session" => {
                let operator = self.session.current_operator().await;
                let role = self.session.connections().active_role().await;
                json!({
                    "authenticated": operator.is_some(),
                    "operator": operator,
                    "role": role,
                })
            }
            "db:search-hn" => {
                let p: HnParams = parse(method, params)?;
                to_data(&records.search_by_hn(session, &p.hn).await?)?
            }
            "db:search-name" => {
                let p: NameParams = parse(method, params)?;
                to_data(&records.search_by_name(session, &p.name).await?)?
            }
            "db:search-multi" => {
                let filter: SearchFilter = parse(method, params)?;
                to_data(&records.search_multi_criteria(session, filter).await?)?
            }
            "db:get-person" => {
                let p: GetPersonParams = parse(method, params)?;
                to_data(
                    &records
                        .get_person(session, p.kind, &p.hn, p.include_inactive)
                        .await?,
                )?
            }
            "db:list-active" => {
                let p: KindParams = parse(method, params)?;
                to_data(&records.list_active(session, p.kind).await?)?
            }
            "db:list-relations" => to_data(&records.list_relations(session).await?)?,
            "db:insert-child" | "db:insert-parent" => {
                let p: InsertParams = parse(method, params)?;
                to_data(&records.insert(session, kind_of(method), p.data).await?)?
            }
            "db:register-family" => {
                let p: FamilyParams = parse(method, params)?;
                to_data(&records.register_family(session, p.child, p.parent).await?)?
            }
            "db:update-child" | "db:update-parent" => {
                let p: UpdateParams = parse(method, params)?;
                to_data(&records.update(session, kind_of(method), &p.hn, p.data).await?)?
            }
            "db:deactivate-child" | "db:deactivate-parent" => {
                let p: HnParams = parse(method, params)?;
                let kind = kind_of(method);
                records.deactivate(session, kind, &p.hn).await?;
                message(&format!("Deactivated {} {}", kind, p.hn))
            }
            "db:hard-delete-child" | "db:hard-delete-parent" => {
                let p: HnParams = parse(method, params)?;
                let kind = kind_of(method);
                records.hard_delete(session, kind, &p.hn).await?;
                message(&format!("Deleted {} {}", kind, p.hn))
            }
            "db:link-parent-child" => {
                let p: LinkParams = parse(method, params)?;
                to_data(&records.link(session, &p.parent_hn, &p.child_hn).await?)?
            }
            "db:unlink-parent-child" => {
                let p: LinkParams = parse(method, params)?;
                records.unlink(session, &p.parent_hn, &p.child_hn).await?;
                message(&format!("Unlinked parent {} from child {}", p.parent_hn, p.child_hn))
            }
            "db:insert-child-vectors" | "db:insert-parent-vectors" => {
                let p: VectorParams = parse(method, params)?;
                let hn = p.hn.clone();
                let set = p.into_capture_set()?;
                to_data(
                    &records
                        .insert_vectors(session, kind_of(method), &hn, set.vectors, set.folder)
                        .await?,
                )?
            }
            "db:find-closest-child" | "db:find-closest-parent" => {
                let p: ProbeParams = parse(method, params)?;
                let probe = p.into_vector();
                to_data(&self.matcher.find_closest(session, kind_of(method), &probe).await?)?
            }
            "db:identify-person" => {
                let p: ProbeParams = parse(method, params)?;
                let probe = p.into_vector();
                to_data(&self.matcher.identify(session, &probe).await?)?
            }
            "db:insert-operator" => {
                let p: NewOperator = parse(method, params)?;
                to_data(&records.insert_operator(session, p).await?)?
            }
            "db:activity-log" => {
                let p: ActivityParams = parse(method, params)?;
                to_data(&records.activity_log(session, p.limit).await?)?
            }
            _ => return Ok(None),
        };

        Ok(Some(data))
    }
}

/// Population addressed by a `-child` / `-parent` method name
fn kind_of(method: &str) -> PersonKind {
    if method.ends_with("-parent") || method.contains("-parent-") {
        PersonKind::Parent
    } else {
        PersonKind::Child
    }
}

fn message(text: &str) -> Value {
    json!({ "message": text })
}

fn to_data<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RegistryError::Other(e.into()))
}

async fn send_response<W>(writer: &mut W, response: &Response) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
