//! Tool registry and the builder that wires production backends
//!
//! The registry is read-only once built and is shared by reference with
//! every orchestration run.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::mail::Mailbox;

use super::email::{ScheduleEmail, SendEmail};
use super::image::GenerateImage;
use super::moltbook::{MoltbookClient, MoltbookTool};
use super::system::SystemInfo;
use super::web::WebSearch;
use super::{Tool, ToolKind, ToolSpec};

/// A registered tool: its static spec plus the capability that runs it
#[derive(Clone)]
pub struct RegisteredTool {
    pub kind: ToolKind,
    pub spec: ToolSpec,
    pub tool: Arc<dyn Tool>,
}

/// Registry of available tools
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability for a tool kind, replacing any previous one
    pub fn register(&mut self, kind: ToolKind, tool: Arc<dyn Tool>) {
        self.tools.insert(
            kind,
            RegisteredTool {
                kind,
                spec: kind.spec(),
                tool,
            },
        );
    }

    pub fn get(&self, kind: ToolKind) -> Option<&RegisteredTool> {
        self.tools.get(&kind)
    }

    /// Look up a tool by the name the model used
    pub fn get_by_name(&self, name: &str) -> Option<&RegisteredTool> {
        ToolKind::from_name(name).and_then(|kind| self.get(kind))
    }

    /// Specs of all registered tools, in catalog order
    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.tools.values().map(|t| &t.spec).collect()
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builder for the production tool registry
///
/// A tool family whose credentials are missing is left out; the model then
/// gets an "unknown tool" result if it asks for it anyway.
pub struct ToolRegistryBuilder {
    config: Config,
    mailbox: Option<Arc<dyn Mailbox>>,
    include_web: bool,
    include_moltbook: bool,
    include_email: bool,
    include_system: bool,
    include_image: bool,
}

impl ToolRegistryBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mailbox: None,
            include_web: true,
            include_moltbook: true,
            include_email: true,
            include_system: true,
            include_image: true,
        }
    }

    /// Mailbox used by the email tools
    pub fn with_mailbox(mut self, mailbox: Arc<dyn Mailbox>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn with_web(mut self, enabled: bool) -> Self {
        self.include_web = enabled;
        self
    }

    pub fn with_moltbook(mut self, enabled: bool) -> Self {
        self.include_moltbook = enabled;
        self
    }

    pub fn with_email(mut self, enabled: bool) -> Self {
        self.include_email = enabled;
        self
    }

    pub fn with_system(mut self, enabled: bool) -> Self {
        self.include_system = enabled;
        self
    }

    pub fn with_image(mut self, enabled: bool) -> Self {
        self.include_image = enabled;
        self
    }

    pub fn build(self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();

        if self.include_web {
            match self.config.web_search.get_api_key() {
                Some(api_key) => registry.register(
                    ToolKind::WebSearch,
                    Arc::new(WebSearch::new(api_key, self.config.web_search.max_results)),
                ),
                None => debug!("Web search disabled: no API key in ${}", self.config.web_search.api_key_env),
            }
        }

        if self.include_moltbook {
            match self.config.moltbook.get_api_key() {
                Some(api_key) => match MoltbookClient::new(&self.config.moltbook.base_url, api_key) {
                    Ok(client) => {
                        let client = Arc::new(client);
                        for kind in ToolKind::MOLTBOOK {
                            registry.register(kind, Arc::new(MoltbookTool::new(kind, client.clone())));
                        }
                    }
                    Err(e) => warn!("Moltbook tools disabled: {}", e),
                },
                None => debug!("Moltbook tools disabled: no API key in ${}", self.config.moltbook.api_key_env),
            }
        }

        if self.include_email {
            match &self.mailbox {
                Some(mailbox) => {
                    registry.register(ToolKind::SendEmail, Arc::new(SendEmail::new(mailbox.clone())));
                    registry.register(ToolKind::ScheduleEmail, Arc::new(ScheduleEmail::new(mailbox.clone())));
                }
                None => debug!("Email tools disabled: no mailbox configured"),
            }
        }

        if self.include_system {
            registry.register(ToolKind::GetSystemInfo, Arc::new(SystemInfo::new()));
        }

        if self.include_image {
            match self.config.image.get_api_token() {
                Some(token) => registry.register(
                    ToolKind::GenerateImage,
                    Arc::new(GenerateImage::new(self.config.image.clone(), token)),
                ),
                None => debug!("Image generation disabled: no token in ${}", self.config.image.api_token_env),
            }
        }

        info!(tools = registry.len(), "Tool registry built");
        registry
    }
}
