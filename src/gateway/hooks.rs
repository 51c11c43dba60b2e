//! Document lifecycle hooks.
//!
//! Hooks run after the validated write paths (insert, update_validated,
//! delete) and are never run by `update_raw`. A failing hook fails the
//! operation, but the write that preceded it stays committed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use docgate_common::Record;

use super::context::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    AfterInsert,
    OnUpdate,
    OnTrash,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::AfterInsert => "after_insert",
            HookEvent::OnUpdate => "on_update",
            HookEvent::OnTrash => "on_trash",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record-type side effects. Every method defaults to a no-op.
pub trait DocumentHook: Send + Sync {
    fn after_insert(&self, _ctx: &RequestContext, _record_type: &str, _doc: &Record) -> Result<()> {
        Ok(())
    }

    fn on_update(&self, _ctx: &RequestContext, _record_type: &str, _doc: &Record) -> Result<()> {
        Ok(())
    }

    fn on_trash(&self, _ctx: &RequestContext, _record_type: &str, _doc: &Record) -> Result<()> {
        Ok(())
    }
}

const ANY_TYPE: &str = "*";

#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<Arc<dyn DocumentHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for one record type, or `"*"` for all of them.
    pub fn register(&mut self, record_type: impl Into<String>, hook: Arc<dyn DocumentHook>) {
        self.hooks.entry(record_type.into()).or_default().push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run type-specific hooks first, then wildcard hooks. Stops at the
    /// first error.
    pub fn fire(
        &self,
        event: HookEvent,
        ctx: &RequestContext,
        record_type: &str,
        doc: &Record,
    ) -> Result<()> {
        let specific = self.hooks.get(record_type).into_iter().flatten();
        let wildcard = self.hooks.get(ANY_TYPE).into_iter().flatten();
        for hook in specific.chain(wildcard) {
            match event {
                HookEvent::AfterInsert => hook.after_insert(ctx, record_type, doc)?,
                HookEvent::OnUpdate => hook.on_update(ctx, record_type, doc)?,
                HookEvent::OnTrash => hook.on_trash(ctx, record_type, doc)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self.hooks.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        counts.sort();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

/// Emits one structured event per lifecycle event on `docgate::activity`.
pub struct ActivityLogHook;

impl ActivityLogHook {
    fn log(&self, event: HookEvent, ctx: &RequestContext, record_type: &str, doc: &Record) {
        let name = doc.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        tracing::info!(
            target: "docgate::activity",
            event = event.as_str(),
            record_type,
            name,
            user = %ctx.user,
            request_id = %ctx.request_id,
            "document {}",
            event
        );
    }
}

impl DocumentHook for ActivityLogHook {
    fn after_insert(&self, ctx: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
        self.log(HookEvent::AfterInsert, ctx, record_type, doc);
        Ok(())
    }

    fn on_update(&self, ctx: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
        self.log(HookEvent::OnUpdate, ctx, record_type, doc);
        Ok(())
    }

    fn on_trash(&self, ctx: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
        self.log(HookEvent::OnTrash, ctx, record_type, doc);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every event it sees as `(event, record_type, name)`.
    #[derive(Default)]
    pub struct RecordingHook {
        pub seen: Mutex<Vec<(HookEvent, String, String)>>,
    }

    impl RecordingHook {
        fn push(&self, event: HookEvent, record_type: &str, doc: &Record) {
            let name = doc.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            self.seen
                .lock()
                .unwrap()
                .push((event, record_type.to_string(), name.to_string()));
        }

        pub fn events(&self) -> Vec<(HookEvent, String, String)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl DocumentHook for RecordingHook {
        fn after_insert(&self, _: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
            self.push(HookEvent::AfterInsert, record_type, doc);
            Ok(())
        }

        fn on_update(&self, _: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
            self.push(HookEvent::OnUpdate, record_type, doc);
            Ok(())
        }

        fn on_trash(&self, _: &RequestContext, record_type: &str, doc: &Record) -> Result<()> {
            self.push(HookEvent::OnTrash, record_type, doc);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHook;
    use super::*;
    use serde_json::json;

    fn doc(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("name".into(), json!(name));
        r
    }

    struct Failing;

    impl DocumentHook for Failing {
        fn on_trash(&self, _: &RequestContext, _: &str, _: &Record) -> Result<()> {
            anyhow::bail!("trash refused")
        }
    }

    #[test]
    fn fires_specific_then_wildcard_hooks() {
        let lead_hook = Arc::new(RecordingHook::default());
        let any_hook = Arc::new(RecordingHook::default());
        let mut registry = HookRegistry::new();
        registry.register("Lead", lead_hook.clone());
        registry.register("*", any_hook.clone());
        let ctx = RequestContext::new("Administrator");

        registry.fire(HookEvent::AfterInsert, &ctx, "Lead", &doc("L-1")).unwrap();
        registry.fire(HookEvent::OnUpdate, &ctx, "Customer", &doc("C-1")).unwrap();

        assert_eq!(lead_hook.events().len(), 1);
        assert_eq!(any_hook.events().len(), 2);
        assert_eq!(any_hook.events()[1].0, HookEvent::OnUpdate);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn hook_error_propagates() {
        let mut registry = HookRegistry::new();
        registry.register("Lead", Arc::new(Failing));
        let ctx = RequestContext::new("Administrator");
        assert!(registry.fire(HookEvent::OnUpdate, &ctx, "Lead", &doc("L-1")).is_ok());
        let err = registry
            .fire(HookEvent::OnTrash, &ctx, "Lead", &doc("L-1"))
            .unwrap_err();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn event_names() {
        let names: Vec<_> = [HookEvent::AfterInsert, HookEvent::OnUpdate, HookEvent::OnTrash]
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(names, vec!["after_insert", "on_update", "on_trash"]);
    }
}
