//! Bot module for handling Telegram interactions
//!
//! - `commands`: top-level commands
//! - `message_handler`: routes text to the collector and delivers results
//! - `ui_builder`: keyboards and composed messages

pub mod commands;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use teloxide::types::ChatId;

use crate::delivery::{Finalizer, MovieFinalizer, RecipeFinalizer};
use crate::dialogue::ConversationCollector;
use crate::flows::{FlowCatalog, FlowKind};
use crate::metadata::MetadataProvider;

pub use message_handler::{message_handler, respond_to_text, Reply};

/// Shared by every handler invocation
pub struct BotState {
    pub collector: ConversationCollector<ChatId>,
    pub flows: FlowCatalog,
    pub bot_username: String,
    recipe: Arc<dyn Finalizer>,
    movie: Arc<dyn Finalizer>,
}

impl BotState {
    pub fn new(bot_username: impl Into<String>, metadata: Option<Arc<dyn MetadataProvider>>) -> Self {
        Self::with_finalizers(
            bot_username,
            Arc::new(RecipeFinalizer),
            Arc::new(MovieFinalizer::new(metadata)),
        )
    }

    pub fn with_finalizers(
        bot_username: impl Into<String>,
        recipe: Arc<dyn Finalizer>,
        movie: Arc<dyn Finalizer>,
    ) -> Self {
        Self {
            collector: ConversationCollector::new(),
            flows: FlowCatalog::new(),
            bot_username: bot_username.into(),
            recipe,
            movie,
        }
    }

    pub fn finalizer(&self, kind: FlowKind) -> Arc<dyn Finalizer> {
        match kind {
            FlowKind::Recipe => Arc::clone(&self.recipe),
            FlowKind::Movie => Arc::clone(&self.movie),
        }
    }
}
