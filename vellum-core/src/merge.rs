//! Layout + page script merging.
//!
//! The merged record keeps layout and page hooks and data factories in
//! separate slots, so neither side can clobber the other. Everything else
//! merges with page entries winning.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::error;

use crate::component::ComponentContext;
use crate::route::to_pascal_case;
use crate::script::{
    ComponentRegistry, Computed, DataFactory, DataUrl, Hook, HookPoint, HookResult, LifecycleHooks,
    Method, ScriptDefinition, Watcher,
};

#[derive(Debug, Clone)]
pub struct MergedScript {
    pub name: String,
    pub props: Option<Value>,
    pub emits: Option<Value>,
    pub provide: Option<Value>,
    pub inject: Option<Value>,
    pub methods: BTreeMap<String, Method>,
    pub computed: BTreeMap<String, Computed>,
    pub watch: BTreeMap<String, Watcher>,
    pub components: ComponentRegistry,
    pub data_url: Option<DataUrl>,
    layout_data: Option<DataFactory>,
    page_data: Option<DataFactory>,
    layout_hooks: LifecycleHooks,
    page_hooks: LifecycleHooks,
}

fn overlay<V: Clone>(base: &BTreeMap<String, V>, top: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut merged = base.clone();
    merged.extend(top.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

impl MergedScript {
    /// Merge an optional layout script under a page script.
    ///
    /// `route` supplies the component name when neither script names itself.
    pub fn merge(layout: Option<&ScriptDefinition>, page: &ScriptDefinition, route: &str) -> Self {
        let empty = ScriptDefinition::default();
        let base = layout.unwrap_or(&empty);

        Self {
            name: page
                .name
                .clone()
                .or_else(|| base.name.clone())
                .unwrap_or_else(|| to_pascal_case(route)),
            props: page.props.clone().or_else(|| base.props.clone()),
            emits: page.emits.clone().or_else(|| base.emits.clone()),
            provide: page.provide.clone().or_else(|| base.provide.clone()),
            inject: page.inject.clone().or_else(|| base.inject.clone()),
            methods: overlay(&base.methods, &page.methods),
            computed: overlay(&base.computed, &page.computed),
            watch: overlay(&base.watch, &page.watch),
            components: overlay(&base.components, &page.components),
            data_url: page.data_url.clone(),
            layout_data: base.data.clone(),
            page_data: page.data.clone(),
            layout_hooks: base.hooks.clone(),
            page_hooks: page.hooks.clone(),
        }
    }

    /// Layout data overlaid with page data.
    pub fn initial_data(&self) -> Map<String, Value> {
        let mut data = self.layout_data.as_ref().map(DataFactory::produce).unwrap_or_default();
        if let Some(page) = &self.page_data {
            data.extend(page.produce());
        }
        data
    }

    /// Hooks registered at `point`, layout first.
    pub fn hook_chain(&self, point: HookPoint) -> Vec<Hook> {
        self.layout_hooks
            .get(&point)
            .into_iter()
            .chain(self.page_hooks.get(&point))
            .cloned()
            .collect()
    }

    pub fn has_hooks(&self, point: HookPoint) -> bool {
        self.layout_hooks.contains_key(&point) || self.page_hooks.contains_key(&point)
    }

    /// Run the hook chain at `point`, awaiting each hook before the next.
    ///
    /// Stops at the first failing hook and returns its error.
    pub async fn run_hook(&self, point: HookPoint, ctx: &ComponentContext) -> HookResult {
        for hook in self.hook_chain(point) {
            if let Err(err) = hook.call(ctx.clone()).await {
                error!(
                    hook = point.as_str(),
                    route = %ctx.route(),
                    error = %err,
                    "Lifecycle hook failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_wins_scalars() {
        let layout = ScriptDefinition::new().with_name("Shell").with_props(json!(["title"]));
        let page = ScriptDefinition::new().with_emits(json!(["saved"]));

        let merged = MergedScript::merge(Some(&layout), &page, "user-list");
        assert_eq!(merged.name, "Shell");
        assert_eq!(merged.props, Some(json!(["title"])));
        assert_eq!(merged.emits, Some(json!(["saved"])));

        let merged = MergedScript::merge(None, &page, "user-list");
        assert_eq!(merged.name, "UserList");
    }

    #[test]
    fn test_page_method_overrides_layout() {
        let layout_foo = Method::sync(|_, _| json!("layout"));
        let page_foo = Method::sync(|_, _| json!("page"));
        let layout = ScriptDefinition::new()
            .with_method("foo", layout_foo)
            .with_method("menu", Method::sync(|_, _| json!("menu")));
        let page = ScriptDefinition::new().with_method("foo", page_foo.clone());

        let merged = MergedScript::merge(Some(&layout), &page, "home");
        assert!(merged.methods["foo"].ptr_eq(&page_foo));
        assert!(merged.methods.contains_key("menu"));
    }

    #[test]
    fn test_data_slots() {
        let layout =
            ScriptDefinition::new().with_data_value(json!({"title": "Shell", "menuOpen": false}));
        let page = ScriptDefinition::new().with_data_value(json!({"title": "Products"}));

        let data = MergedScript::merge(Some(&layout), &page, "products").initial_data();
        assert_eq!(data["title"], json!("Products"));
        assert_eq!(data["menuOpen"], json!(false));
    }

    #[test]
    fn test_hooks_kept_in_both_slots() {
        let layout = ScriptDefinition::new().with_hook(HookPoint::Mounted, Hook::sync(|_| {}));
        let page = ScriptDefinition::new()
            .with_hook(HookPoint::Mounted, Hook::sync(|_| {}))
            .with_hook(HookPoint::Unmounted, Hook::sync(|_| {}));

        let merged = MergedScript::merge(Some(&layout), &page, "home");
        assert_eq!(merged.hook_chain(HookPoint::Mounted).len(), 2);
        assert_eq!(merged.hook_chain(HookPoint::Unmounted).len(), 1);
        assert!(!merged.has_hooks(HookPoint::BeforeMount));
    }

    #[test]
    fn test_data_url_comes_from_page() {
        let layout = ScriptDefinition::new().with_data_url("/api/layout");
        let page = ScriptDefinition::new();
        assert!(MergedScript::merge(Some(&layout), &page, "home").data_url.is_none());
    }
}
