//! Configuration responder
//!
//! Every key currently renders not-found, which tells the switch to use
//! its on-disk static configuration. The `callcenter.conf` branch is the
//! extension point for generating queue and agent definitions from the
//! database.

use super::request::ConfigurationRequest;
use super::NOT_FOUND_XML;
use crate::domain::queue::QueueRepository;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConfigurationHandler {
    #[allow(dead_code)]
    queues: Arc<dyn QueueRepository>,
}

impl ConfigurationHandler {
    pub fn new(queues: Arc<dyn QueueRepository>) -> Self {
        Self { queues }
    }

    pub async fn handle(&self, req: &ConfigurationRequest) -> String {
        debug!(
            "configuration request: key={}, value={}",
            req.key_name, req.key_value
        );

        match req.key_value.as_str() {
            "callcenter.conf" => self.handle_callcenter().await,
            _ => {
                debug!("configuration: using static config for {}", req.key_value);
                NOT_FOUND_XML.to_string()
            }
        }
    }

    /// TODO: generate callcenter.conf from voip.queues + voip.queue_agents
    /// so queue changes no longer require a switch reload.
    async fn handle_callcenter(&self) -> String {
        info!("configuration: dynamic callcenter.conf not yet implemented");
        NOT_FOUND_XML.to_string()
    }
}
