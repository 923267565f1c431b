//! Master-data module: materials, suppliers, employees, users and the other
//! reference collections of the ERP console, plus business-code sequences,
//! permission profiles and file attachments.

pub mod acl;
pub mod api;
pub mod model;
pub mod service;
mod store_impls;

use std::sync::Arc;

use axum::Router;
use openerp_core::ServiceModule;
use tracing::info;

use service::{MdmService, SequenceError};

pub struct MdmModule {
    service: Arc<MdmService>,
}

impl MdmModule {
    pub fn new(service: MdmService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Define the default code series that do not exist yet.
    pub fn seed(&self) -> Result<(), SequenceError> {
        let created = self.service.issuer.ensure_defaults()?;
        if created > 0 {
            info!("mdm: seeded {} default sequences", created);
        }
        Ok(())
    }
}

impl ServiceModule for MdmModule {
    fn name(&self) -> &str {
        "mdm"
    }

    fn routes(&self) -> Router {
        api::router(self.service.clone())
    }
}
