//! Hickory DNS authority answering the CDN name with the closest replica.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, NS, SOA};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::DnsConfig;
use crate::metrics::{self, QueryResult, Timer};
use crate::selector::ReplicaSelector;

/// Authority for the CDN name.
///
/// The zone origin is the CDN name itself. `A`/`AAAA` queries for it are
/// answered with the replica closest to the query's source address.
pub struct CdnAuthority {
    origin: LowerName,
    selector: ReplicaSelector,
    config: Arc<DnsConfig>,
}

impl CdnAuthority {
    /// Create an authority for the given configuration and selector.
    pub fn new(config: DnsConfig, selector: ReplicaSelector) -> Result<Self, hickory_proto::ProtoError> {
        // Query names off the wire are always fully qualified
        let mut origin = Name::from_ascii(&config.cdn_name)?;
        origin.set_fqdn(true);

        Ok(Self {
            origin: origin.into(),
            selector,
            config: Arc::new(config),
        })
    }

    /// The selector used to answer address queries.
    pub fn selector(&self) -> &ReplicaSelector {
        &self.selector
    }

    fn single_record(&self, name: Name, rtype: RecordType, rdata: RData) -> RecordSet {
        let mut record_set = RecordSet::new(name.clone(), rtype, 0);
        let mut record = Record::from_rdata(name, self.config.ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);
        record_set
    }

    /// Build the SOA record for this zone.
    fn build_soa_record(&self) -> RecordSet {
        let soa = &self.config.soa;
        let rdata = SOA::new(
            Name::from_ascii(&soa.mname).unwrap_or_else(|_| Name::root()),
            Name::from_ascii(&soa.rname).unwrap_or_else(|_| Name::root()),
            soa.serial,
            i32::try_from(soa.refresh).unwrap_or(i32::MAX),
            i32::try_from(soa.retry).unwrap_or(i32::MAX),
            i32::try_from(soa.expire).unwrap_or(i32::MAX),
            soa.minimum,
        );

        self.single_record(Name::from(self.origin.clone()), RecordType::SOA, RData::SOA(rdata))
    }

    /// Build an NS record for this zone.
    fn build_ns_record(&self) -> RecordSet {
        let ns_name = Name::from_ascii(&self.config.soa.mname).unwrap_or_else(|_| Name::root());
        self.single_record(Name::from(self.origin.clone()), RecordType::NS, RData::NS(NS(ns_name)))
    }

    /// Answer an address query for `client`.
    async fn lookup_address(
        &self,
        name: &LowerName,
        rtype: RecordType,
        client: IpAddr,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<LookupRecords> {
        let timer = Timer::start();
        let rtype_str = rtype.to_string();

        if name != &self.origin {
            debug!(name = %name, "address lookup outside CDN name");
            metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)));
        }

        // Usually already selected by the request handler
        let selection = match self.selector.cached(client) {
            Some(selection) => Some(selection),
            None => self.selector.select_closest(client).await,
        };

        let Some(selection) = selection else {
            debug!(%client, "no replica available, returning SERVFAIL");
            metrics::record_query(&rtype_str, QueryResult::NoReplica, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::ServFail)));
        };

        let rdata = match (rtype, selection.replica.addr) {
            (RecordType::A, IpAddr::V4(v4)) => RData::A(A::from(v4)),
            (RecordType::AAAA, IpAddr::V6(v6)) => RData::AAAA(AAAA::from(v6)),
            (_, addr) => {
                debug!(%client, %addr, rtype = ?rtype, "closest replica has no address of this family");
                metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)));
            }
        };

        debug!(
            %client,
            replica = %selection.replica.hostname,
            addr = %selection.replica.addr,
            distance_km = selection.distance_km,
            "answering with closest replica"
        );
        metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
        let record_set = Arc::new(self.single_record(Name::from(name.clone()), rtype, rdata));
        LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
    }
}

#[async_trait]
impl Authority for CdnAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = rtype.to_string();

        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        if name != &self.origin {
            debug!(name = %name, "name below CDN origin, NXDOMAIN");
            metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)));
        }

        match rtype {
            RecordType::SOA => {
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                let record_set = Arc::new(self.build_soa_record());
                LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
            }
            RecordType::NS => {
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                let record_set = Arc::new(self.build_ns_record());
                LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
            }
            _ => {
                // Address records depend on the client and are answered from search()
                trace!(name = %name, rtype = ?rtype, "no client-independent records");
                metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let rtype = request_info.query.query_type();

        if matches!(rtype, RecordType::A | RecordType::AAAA) {
            return self
                .lookup_address(
                    request_info.query.name(),
                    rtype,
                    // Dual-stack listeners report IPv4 clients as ::ffff:a.b.c.d
                    request_info.src.ip().to_canonical(),
                    lookup_options,
                )
                .await;
        }

        self.lookup(request_info.query.name(), rtype, lookup_options)
            .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}
