//! Request-scoped context passed to every engine entry point.

use meetup_id::RequestId;
use meetup_roster::{Tenant, ValidationError};

/// Who is asking, and for which tenant.
///
/// Tenant resolution happens at the edge; the engine never consults
/// process-wide state to find it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub tenant: Option<Tenant>,
}

impl RequestContext {
    pub fn new(tenant: Option<Tenant>) -> Self {
        Self {
            request_id: RequestId::new(),
            tenant,
        }
    }

    /// Builds a context from a raw tenant header; blank means the default tenant.
    pub fn from_tenant_header(header: Option<&str>) -> Result<Self, ValidationError> {
        Tenant::from_header(header).map(Self::new)
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}
