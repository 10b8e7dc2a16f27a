//! Config tree to rendering schema.
//!
//! The structural part of the schema is built in one synchronous pass over
//! the blocks and fields. Dictionary and lookup options are collected as
//! independent futures during that pass and joined at the end, so a slow or
//! failing source only holds up its own field.

use std::sync::Arc;

use futures::future::join_all;
use indexmap::map::Entry;
use serde_json::{Map, Value};

use crate::{
    config::{BlockDescriptor, ConfigTree, EnumSource},
    module_cache::ModuleCache,
    options::CompilerOptions,
    resolver::{EnumOptions, EnumResolver},
    schema::{SchemaBlock, SchemaTree},
};

pub mod bind;
pub mod field;

pub use bind::{BindFieldExpander, BoundPair};
pub use field::synthesize;

/// Compiles form configurations into rendering schemas.
///
/// A compiler is cheap to share; every call to [`compile`](Self::compile)
/// builds its own tree, while the support tables stay cached in the
/// [`ModuleCache`].
#[derive(Clone)]
pub struct SchemaCompiler {
    resolver: EnumResolver,
    options: CompilerOptions,
}

impl SchemaCompiler {
    pub fn new(cache: Arc<ModuleCache>) -> Self {
        Self {
            resolver: EnumResolver::new(cache),
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ModuleCache> {
        self.resolver.cache()
    }

    /// Compile a `{ "config": ... }` document.
    ///
    /// Returns `None` when the document has no usable config; the reason is
    /// logged.
    pub async fn compile(&self, document: &Value) -> Option<SchemaTree> {
        match ConfigTree::from_document(document) {
            Ok(config) => Some(self.compile_tree(&config).await),
            Err(e) => {
                warn!("form config rejected: {e}");
                None
            }
        }
    }

    /// Compile an already parsed config tree.
    pub async fn compile_tree(&self, config: &ConfigTree) -> SchemaTree {
        let title = config
            .title
            .clone()
            .unwrap_or_else(|| self.options.default_title.clone());
        let mut schema = SchemaTree::new(title, self.options.ui_options.clone());

        // Companions may target any block, so every block exists up front.
        for (key, block) in &config.blocks {
            schema
                .properties
                .insert(key.clone(), self.block_skeleton(block));
        }

        let expander = BindFieldExpander::new(&self.options);
        let mut pending = Vec::new();

        for (block_key, block) in &config.blocks {
            for (field_key, field) in &block.properties {
                if let Some(pair) = expander.expand(block_key, field_key, field) {
                    place_bound(&mut schema, block_key, field_key, field.required, pair);
                    continue;
                }

                let mut property = synthesize(field, &self.options);
                match field.enum_source() {
                    Some(EnumSource::Static(options)) => {
                        EnumOptions::from_options(options).apply_to(&mut property)
                    }
                    Some(source) => {
                        let resolver = &self.resolver;
                        pending.push(async move {
                            let options = resolver.resolve_source(source).await;
                            (block_key, field_key, options)
                        });
                    }
                    None => {}
                }

                let Some(out) = schema.properties.get_mut(block_key) else {
                    continue;
                };
                if field.required {
                    out.required.push(field_key.clone());
                }
                // A companion may already hold this key; the declared field
                // takes its place in declaration order.
                out.properties.shift_remove(field_key);
                out.properties.insert(field_key.clone(), property);
            }
        }

        if !pending.is_empty() {
            debug!("waiting on {} option lookups", pending.len());
        }
        for (block_key, field_key, options) in join_all(pending).await {
            if let Some(property) = schema.field_mut(block_key, field_key) {
                options.apply_to(property);
            }
        }

        schema
    }

    fn block_skeleton(&self, block: &BlockDescriptor) -> SchemaBlock {
        let mut out = SchemaBlock {
            title: block.title.clone().unwrap_or_default(),
            ..Default::default()
        };
        if let Some(fold) = block.can_be_folded {
            let mut ui = Map::new();
            ui.insert("canBeFolded".to_string(), Value::Bool(fold));
            out.ui_options = Some(ui);
        }
        out.attributes.extend(
            block
                .extensions(&self.options.extension_prefix)
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        out
    }
}

fn place_bound(
    schema: &mut SchemaTree,
    block_key: &str,
    field_key: &str,
    required: bool,
    pair: BoundPair,
) {
    if let Some(out) = schema.properties.get_mut(block_key) {
        if required {
            out.required.push(field_key.to_string());
        }
        out.properties.shift_remove(field_key);
        out.properties.insert(field_key.to_string(), pair.primary);
    }

    let target = if schema.properties.contains_key(&pair.target_block) {
        pair.target_block.as_str()
    } else {
        warn!(
            "`{block_key}.{field_key}` binds to unknown block `{}`, keeping `{}` in `{block_key}`",
            pair.target_block, pair.companion_key
        );
        block_key
    };
    let Some(out) = schema.properties.get_mut(target) else {
        return;
    };
    match out.properties.entry(pair.companion_key) {
        Entry::Vacant(slot) => {
            slot.insert(pair.companion);
        }
        Entry::Occupied(slot) => {
            debug!(
                "`{target}.{}` already present, `{block_key}.{field_key}` keeps it",
                slot.key()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{LookupTable, StaticSource};
    use serde_json::json;

    fn cache() -> Arc<ModuleCache> {
        let dict = json!({
            "sexDict": [{ "code": "1", "name": "男" }, { "code": "2", "name": "女" }],
            "loan": { "repayment": [{ "value": "8", "label": "利息按期" }] }
        });
        let lookups = LookupTable::new()
            .with_function("queryDict", |params: Value| async move {
                let data = match params["dictCode"].as_str() {
                    Some("repaymentDict") => json!([
                        { "code": "1", "name": "本金和利息按期等额收取" },
                        { "code": "2", "name": "本金按期等额、利息首期收取" }
                    ]),
                    _ => json!([]),
                };
                Ok::<_, anyhow::Error>(json!({ "code": 0, "data": data }))
            })
            .with_value("notCallable", json!({ "code": 0, "data": [] }));

        Arc::new(
            ModuleCache::new()
                .with_dictionary_source(StaticSource::new("inline", dict))
                .with_lookup_source(StaticSource::new("inline", lookups)),
        )
    }

    fn compiler() -> SchemaCompiler {
        let _ = env_logger::builder().is_test(true).try_init();
        SchemaCompiler::new(cache())
    }

    #[tokio::test]
    async fn test_missing_config_yields_none() {
        let c = compiler();
        assert!(c.compile(&json!({})).await.is_none());
        assert!(c.compile(&json!({ "config": "BLOCK01" })).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_fields_do_not_sink_the_form() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "name": { "title": "姓名", "required": true },
                "birthday": { "title": "生日", "type": "Date" },
                "code": { "title": 123, "maxLength": "11位" },
                "broken": 42
            } } } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK01").unwrap();
        let keys: Vec<_> = block.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "birthday", "code"]);
        assert_eq!(block.required, ["name"]);

        let birthday = serde_json::to_value(&block.properties["birthday"]).unwrap();
        assert_eq!(birthday["type"], "string");
        let code = serde_json::to_value(&block.properties["code"]).unwrap();
        assert_eq!(code["title"], "123");
        assert!(code["ui:options"].get("maxLength").is_none());
    }

    #[tokio::test]
    async fn test_empty_block_map() {
        let tree = compiler().compile(&json!({ "config": {} })).await.unwrap();
        assert_eq!(
            tree.as_json(),
            json!({
                "title": "title",
                "type": "object",
                "required": [],
                "properties": {},
                "ui:options": { "canBeFolded": true, "hrBlockType": "0" }
            })
        );
    }

    #[tokio::test]
    async fn test_dictionary_scenario() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "sex": { "title": "性别", "type": "string", "required": true, "enumDict": "sexDict" }
            } } } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK01").unwrap();
        assert_eq!(block.required, ["sex"]);
        let sex = serde_json::to_value(&block.properties["sex"]).unwrap();
        assert_eq!(sex["enum"], json!(["1", "2"]));
        assert_eq!(sex["enumNames"], json!(["男", "女"]));
        assert_eq!(sex["uniqueItems"], false);
        assert_eq!(sex["ui:options"]["clearable"], true);
        assert_eq!(sex["err:required"], "请选择性别");
    }

    #[tokio::test]
    async fn test_bind_scenario() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "foo": { "title": "Foo", "required": true, "hidden": true, "bindBlock": "BLOCK01", "bindCode": "fooCode" }
            } } } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK01").unwrap();
        let keys: Vec<_> = block.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["foo", "fooCode"]);
        assert_eq!(block.required, ["foo"]);

        let foo = &block.properties["foo"];
        assert_eq!(foo.bind_block.as_deref(), Some("BLOCK01"));
        assert_eq!(foo.bind_code.as_deref(), Some("fooCode"));
        assert!(foo.is_hidden());

        let code = &block.properties["fooCode"];
        assert!(code.is_hidden());
        assert_eq!(code.title, "FooCode");
        assert_eq!(code.bind_block.as_deref(), Some("BLOCK01"));
        assert_eq!(code.bind_code.as_deref(), Some("foo"));
    }

    #[tokio::test]
    async fn test_companion_goes_to_target_block() {
        let tree = compiler()
            .compile(&json!({ "config": {
                "BLOCK01": { "properties": {
                    "area": { "widget": "AreaWidget", "required": true, "bindBlock": "BLOCK02", "bindCode": "areaCode" }
                } },
                "BLOCK02": { "properties": { "remark": { "title": "备注" } } }
            } }))
            .await
            .unwrap();

        assert!(tree.field("BLOCK01", "areaCode").is_none());
        let code = tree.field("BLOCK02", "areaCode").unwrap();
        assert_eq!(code.title, "省市区Code");
        assert_eq!(code.bind_block.as_deref(), Some("BLOCK01"));
        assert_eq!(tree.block("BLOCK02").unwrap().required, Vec::<String>::new());
        assert_eq!(tree.block("BLOCK01").unwrap().required, ["area"]);
    }

    #[tokio::test]
    async fn test_declared_field_keeps_its_place_after_companion() {
        let tree = compiler()
            .compile(&json!({ "config": {
                "BLOCK01": { "properties": {
                    "area": { "widget": "AreaWidget", "bindBlock": "BLOCK02", "bindCode": "areaCode" }
                } },
                "BLOCK02": { "properties": {
                    "remark": { "title": "备注" },
                    "areaCode": { "title": "区划代码" }
                } }
            } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK02").unwrap();
        let keys: Vec<_> = block.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, ["remark", "areaCode"]);

        let code = &block.properties["areaCode"];
        assert_eq!(code.title, "区划代码");
        assert!(!code.is_hidden());
        assert_eq!(code.bind_block, None);
    }

    #[tokio::test]
    async fn test_unknown_target_block_falls_back() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "foo": { "title": "Foo", "bindBlock": "NOPE", "bindCode": "fooCode" }
            } } } }))
            .await
            .unwrap();
        assert!(tree.field("BLOCK01", "fooCode").is_some());
        assert!(tree.block("NOPE").is_none());
    }

    #[tokio::test]
    async fn test_companion_first_writer_wins() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "first": { "title": "First", "bindBlock": "BLOCK01", "bindCode": "code" },
                "second": { "title": "Second", "bindBlock": "BLOCK01", "bindCode": "code" }
            } } } }))
            .await
            .unwrap();

        let code = tree.field("BLOCK01", "code").unwrap();
        assert_eq!(code.title, "FirstCode");
        assert_eq!(code.bind_code.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_companion_never_required() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "foo": { "title": "Foo", "required": true, "bindBlock": "BLOCK01", "bindCode": "fooCode" },
                "bar": { "title": "Bar", "required": true, "hidden": false, "bindBlock": "BLOCK01", "bindCode": "barCode" }
            } } } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK01").unwrap();
        assert_eq!(block.required, ["foo", "bar"]);
        for key in ["fooCode", "barCode"] {
            assert!(block.properties[key].is_hidden());
            assert_eq!(block.properties[key].required_message.as_deref(), Some(""));
        }
    }

    #[tokio::test]
    async fn test_lookup_and_degradation() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "repayment": {
                    "title": "还款方式",
                    "enumApi": "queryDict",
                    "enumApiParams": { "dictCode": "repaymentDict" }
                },
                "broken": { "title": "坏的", "required": true, "enumApi": "notCallable" },
                "missing": { "title": "缺失", "enumDict": "no.such.dict" },
                "name": { "title": "姓名", "required": true }
            } } } }))
            .await
            .unwrap();

        let block = tree.block("BLOCK01").unwrap();
        assert_eq!(block.required, ["broken", "name"]);

        let repayment = &block.properties["repayment"];
        assert_eq!(repayment.enum_codes, Some(vec![json!("1"), json!("2")]));

        for key in ["broken", "missing"] {
            let f = &block.properties[key];
            assert_eq!(f.enum_codes, Some(vec![]), "{key}");
            assert_eq!(f.enum_names, Some(vec![]), "{key}");
        }
        assert!(!block.properties["name"].is_choice());
    }

    #[tokio::test]
    async fn test_unavailable_tables_degrade() {
        let c = SchemaCompiler::new(Arc::new(ModuleCache::new()));
        let tree = c
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "sex": { "title": "性别", "enumDict": "sexDict" },
                "repayment": { "title": "还款方式", "enumApi": "queryDict" }
            } } } }))
            .await
            .unwrap();
        for key in ["sex", "repayment"] {
            assert_eq!(tree.field("BLOCK01", key).unwrap().enum_codes, Some(vec![]));
        }
    }

    #[tokio::test]
    async fn test_static_enums_keep_order() {
        let tree = compiler()
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "level": {
                    "title": "等级",
                    "enums": [
                        { "code": "c", "name": "C" },
                        { "code": "a", "name": "A" },
                        { "value": "b", "label": "B" }
                    ],
                    "enumDict": "sexDict"
                }
            } } } }))
            .await
            .unwrap();

        let level = tree.field("BLOCK01", "level").unwrap();
        assert_eq!(level.enum_codes, Some(vec![json!("c"), json!("a"), json!("b")]));
        assert_eq!(
            level.enum_names.as_deref(),
            Some(&["C".to_string(), "A".to_string(), "B".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_order_is_preserved() {
        let tree = compiler()
            .compile(&json!({ "config": {
                "title": "贷款申请",
                "ZETA": { "title": "Z", "properties": {
                    "z2": { "required": true, "enumDict": "sexDict" },
                    "z1": { "required": true }
                } },
                "ALPHA": { "title": "A", "canBeFolded": false, "hrBlockType": "1", "properties": {
                    "a1": { "required": true, "enumApi": "queryDict" }
                } }
            } }))
            .await
            .unwrap();

        assert_eq!(tree.title, "贷款申请");
        let blocks: Vec<_> = tree.properties.keys().map(String::as_str).collect();
        assert_eq!(blocks, ["ZETA", "ALPHA"]);
        assert_eq!(tree.block("ZETA").unwrap().required, ["z2", "z1"]);

        let alpha = serde_json::to_value(tree.block("ALPHA").unwrap()).unwrap();
        assert_eq!(alpha["ui:options"], json!({ "canBeFolded": false }));
        assert_eq!(alpha["hrBlockType"], "1");
    }

    #[tokio::test]
    async fn test_lookups_run_concurrently() {
        const DELAY: Duration = Duration::from_millis(150);

        let lookups = LookupTable::new().with_function("slow", |_params: Value| async move {
            tokio::time::sleep(DELAY).await;
            Ok::<_, anyhow::Error>(json!({ "code": 0, "data": [{ "code": "1", "name": "一" }] }))
        });
        let c = SchemaCompiler::new(Arc::new(
            ModuleCache::new().with_lookup_source(StaticSource::new("inline", lookups)),
        ));
        let fields = ["a", "b", "c", "d"];
        let properties: Map<String, Value> = fields
            .iter()
            .map(|key| (key.to_string(), json!({ "title": key, "enumApi": "slow" })))
            .collect();

        let started = Instant::now();
        let tree = c
            .compile(&json!({ "config": { "BLOCK01": { "properties": properties } } }))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        for key in fields {
            let field = tree.field("BLOCK01", key).unwrap();
            assert_eq!(field.enum_codes, Some(vec![json!("1")]), "{key}");
        }
        assert!(
            elapsed < DELAY * 3,
            "{} lookups took {elapsed:?}",
            fields.len()
        );
    }

    #[test]
    fn test_compile_is_idempotent() {
        let c = compiler();
        let document = json!({ "config": { "BLOCK01": { "properties": {
            "sex": { "title": "性别", "required": true, "enumDict": "sexDict" },
            "foo": { "title": "Foo", "bindBlock": "BLOCK01", "bindCode": "fooCode" },
            "repayment": { "enumApi": "queryDict", "enumApiParams": { "dictCode": "repaymentDict" } },
            "photo": { "title": "照片", "type": "array", "widget": "uploadWidget", "hrTag": "x" }
        } } } });

        let first = tokio_test::block_on(c.compile(&document)).unwrap();
        let second = tokio_test::block_on(c.compile(&document)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_custom_options() {
        let options = CompilerOptions {
            select_prompt: "Select ".to_string(),
            default_title: "Form".to_string(),
            ..Default::default()
        };
        let tree = compiler()
            .with_options(options)
            .compile(&json!({ "config": { "BLOCK01": { "properties": {
                "sex": { "title": "sex", "enums": [{ "code": "1", "name": "M" }] }
            } } } }))
            .await
            .unwrap();
        assert_eq!(tree.title, "Form");
        assert_eq!(
            tree.field("BLOCK01", "sex").unwrap().required_message.as_deref(),
            Some("Select sex")
        );
    }
}
