//! Request handler in front of the catalog.
//!
//! The hickory catalog turns every authority error other than `REFUSED` into
//! an empty `NOERROR` answer for authoritative zones. A client whose closest
//! replica cannot be determined must get `SERVFAIL` instead, so that nothing
//! negatively caches the empty answer and the next query retries. This
//! handler runs the selection for address queries at the CDN name first and
//! answers `SERVFAIL` itself when it fails; everything else, and every
//! successful selection, goes through the catalog.

use async_trait::async_trait;
use hickory_proto::op::{Header, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{LowerName, RecordType};
use hickory_server::authority::{AuthorityObject, Catalog, MessageResponseBuilder};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::authority::CdnAuthority;
use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::metrics::{self, QueryResult, Timer};
use crate::selector::ReplicaSelector;

/// Serves the CDN zone, answering `SERVFAIL` when no replica can be selected.
pub struct CdnRequestHandler {
    catalog: Catalog,
    origin: LowerName,
    selector: ReplicaSelector,
}

impl CdnRequestHandler {
    /// Build a catalog serving the CDN authority and wrap it.
    pub fn new(config: DnsConfig, selector: ReplicaSelector) -> Result<Self, DnsError> {
        let authority = CdnAuthority::new(config, selector.clone())?;
        let origin = authority.origin().clone();

        let mut catalog = Catalog::new();
        let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
        catalog.upsert(origin.clone(), vec![authority]);

        Ok(Self {
            catalog,
            origin,
            selector,
        })
    }

    /// Zone origin, fully qualified.
    pub fn origin(&self) -> &LowerName {
        &self.origin
    }

    /// The selector shared with the authority.
    pub fn selector(&self) -> &ReplicaSelector {
        &self.selector
    }

    /// Client address if `request` is an address query for the CDN name.
    fn address_query_client(&self, request: &Request) -> Option<IpAddr> {
        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            return None;
        }

        let info = request.request_info().ok()?;
        let is_address = matches!(info.query.query_type(), RecordType::A | RecordType::AAAA);
        if !is_address || info.query.name() != &self.origin {
            return None;
        }

        // Dual-stack listeners report IPv4 clients as ::ffff:a.b.c.d
        Some(info.src.ip().to_canonical())
    }
}

#[async_trait]
impl RequestHandler for CdnRequestHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        if let Some(client) = self.address_query_client(request) {
            let timer = Timer::start();

            if self.selector.select_closest(client).await.is_none() {
                debug!(%client, id = request.id(), "no replica available, returning SERVFAIL");
                let rtype = request
                    .request_info()
                    .map(|info| info.query.query_type().to_string())
                    .unwrap_or_default();
                metrics::record_query(&rtype, QueryResult::NoReplica, timer.elapsed());

                let response = MessageResponseBuilder::from_message_request(request);
                let result = response_handle
                    .send_response(response.error_msg(request.header(), ResponseCode::ServFail))
                    .await;

                return match result {
                    Ok(info) => info,
                    Err(e) => {
                        error!("failed to send SERVFAIL: {}", e);
                        let mut header = Header::new();
                        header.set_response_code(ResponseCode::ServFail);
                        header.into()
                    }
                };
            }
        }

        self.catalog.handle_request(request, response_handle).await
    }
}
