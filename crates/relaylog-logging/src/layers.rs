//! Custom tracing layers
//!
//! [`SourceContextLayer`] tags spans with the active source context and
//! [`jsonl_layer`] builds the JSON lines formatter shared by console and
//! file output.

use tracing::{span, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::config::JsonFields;
use crate::context::{SourceContextData, SourceContextGuard};

/// Layer that attaches the current source context to new spans
///
/// Spans created while a [`SourceContextGuard`] is alive carry a
/// [`SourceContextExtension`] that later layers can read.
pub struct SourceContextLayer;

impl SourceContextLayer {
    /// Create a new source context layer
    pub fn new() -> Self {
        Self
    }
}

impl Default for SourceContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct SourceContextExtension {
    pub data: SourceContextData,
}

impl<S> Layer<S> for SourceContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(source_ctx) = SourceContextGuard::current() {
                span.extensions_mut()
                    .insert(SourceContextExtension { data: source_ctx });
            }
        }
    }
}

/// Create a boxed JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, fields: JsonFields) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + Send + Sync + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(fields.spans)
        .with_span_list(fields.spans)
        .with_file(fields.location)
        .with_line_number(fields.location)
        .with_thread_ids(fields.thread)
        .with_thread_names(fields.thread)
        .with_writer(writer)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn span_source_id(span: &tracing::Span) -> Option<String> {
        let id = span.id()?;
        tracing::dispatcher::get_default(|dispatch| {
            let registry = dispatch.downcast_ref::<Registry>()?;
            let span = registry.span(&id)?;
            let extensions = span.extensions();
            extensions
                .get::<SourceContextExtension>()
                .map(|ext| ext.data.source_id.clone())
        })
    }

    #[test]
    fn test_span_tagged_with_source() {
        let subscriber = Registry::default().with(SourceContextLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            let untagged = tracing::info_span!("before");
            assert_eq!(span_source_id(&untagged), None);

            let _guard = SourceContextGuard::new("source-a");
            let tagged = tracing::info_span!("write_event");
            assert_eq!(span_source_id(&tagged).as_deref(), Some("source-a"));
        });
    }
}
