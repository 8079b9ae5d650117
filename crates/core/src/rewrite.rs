//! Capability rewrite pipeline.
//!
//! Each [`RewriteRule`] is a named, declarative edit over the raw JSON tree of
//! a new-session payload, gated by a [`Condition`] on the parsed
//! capabilities. Rules are applied in order by a [`RewritePipeline`]; adding a
//! rule is a matter of adding data, not control flow.
//!
//! Edits that target "every object" visit the tree bottom-up, children before
//! parents, so an edit never sees a node another edit on the same pass has
//! already replaced.

use serde_json::{Map, Value, json};

use crate::capabilities::Capabilities;

/// Versions the upstream hub cannot resolve literally.
const FLOATING_VERSIONS: &[&str] = &["", "latest", "unstable", "beta", "nightly"];

/// Precondition for a rule, evaluated against the parsed capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
	Always,
	/// Browser name matches, ignoring ASCII case.
	Browser(&'static str),
	/// Firefox with no version, or any browser asking for a floating version.
	FloatingVersion,
}

impl Condition {
	pub fn matches(&self, caps: &Capabilities) -> bool {
		match self {
			Condition::Always => true,
			Condition::Browser(family) => caps.is_browser(family),
			Condition::FloatingVersion => {
				let version = caps.version();
				let firefox_unversioned = caps.is_browser("firefox") && version.is_none_or(str::is_empty);
				let floating = version.is_some_and(|v| FLOATING_VERSIONS.iter().any(|f| v.eq_ignore_ascii_case(f)));
				firefox_unversioned || floating
			}
		}
	}
}

/// A single JSON edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
	/// In every object holding a truthy `anchor`, shallow-merge `value` into
	/// the object under `anchor` (right-hand keys win).
	MergeInto { anchor: &'static str, value: Value },
	/// In every object holding a truthy `anchor`, replace the array at
	/// `anchor.path` with `existing ++ existing ++ items`, creating missing
	/// intermediate objects. A missing array counts as empty.
	DoubleAndAppend {
		anchor: &'static str,
		path: &'static [&'static str],
		items: Vec<Value>,
	},
	/// Delete `key` from every object.
	Remove { key: &'static str },
	/// In every object where `key` is truthy, overwrite it with `value`.
	Replace { key: &'static str, value: Value },
}

impl Edit {
	fn apply(&self, document: &mut Value) {
		walk_objects(document, &mut |object| match self {
			Edit::MergeInto { anchor, value } => {
				if let (Some(Value::Object(target)), Value::Object(patch)) = (object.get_mut(*anchor), value) {
					for (k, v) in patch {
						target.insert(k.clone(), v.clone());
					}
				}
			}
			Edit::DoubleAndAppend { anchor, path, items } => {
				if let Some(target) = object.get_mut(*anchor).filter(|v| truthy(v)) {
					double_and_append(target, path, items);
				}
			}
			Edit::Remove { key } => {
				object.remove(*key);
			}
			Edit::Replace { key, value } => {
				if let Some(slot) = object.get_mut(*key).filter(|v| truthy(v)) {
					*slot = value.clone();
				}
			}
		});
	}
}

/// A named, conditional edit.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteRule {
	pub name: &'static str,
	pub when: Condition,
	pub edit: Edit,
}

impl RewriteRule {
	pub fn new(name: &'static str, when: Condition, edit: Edit) -> Self {
		Self { name, when, edit }
	}
}

/// Ordered list of rules.
#[derive(Debug, Clone, Default)]
pub struct RewritePipeline {
	rules: Vec<RewriteRule>,
}

impl RewritePipeline {
	pub fn new(rules: Vec<RewriteRule>) -> Self {
		Self { rules }
	}

	/// Policy applied to every new-session payload before provisioning.
	pub fn session_policy() -> Self {
		Self::new(vec![
			RewriteRule::new(
				"browser-logging",
				Condition::Always,
				Edit::MergeInto {
					anchor: "desiredCapabilities",
					value: json!({"loggingPrefs": {"browser": "ALL"}}),
				},
			),
			RewriteRule::new(
				"opera-binary",
				Condition::Browser("operablink"),
				Edit::MergeInto {
					anchor: "desiredCapabilities",
					value: json!({"operaOptions": {"args": [], "binary": "/usr/bin/opera", "extensions": []}}),
				},
			),
			// Existing args are repeated before the flag is appended. Kept as
			// observed on deployed hubs until confirmed intentional.
			RewriteRule::new(
				"chrome-infobars",
				Condition::Browser("chrome"),
				Edit::DoubleAndAppend {
					anchor: "desiredCapabilities",
					path: &["chromeOptions", "args"],
					items: vec![json!("disable-infobars")],
				},
			),
			RewriteRule::new("strip-browser-id", Condition::Always, Edit::Remove { key: "browserId" }),
		])
	}

	/// Applied only to the payload sent upstream: hubs reject floating
	/// version names, so they are blanked.
	pub fn forward_policy() -> Self {
		Self::new(vec![
			RewriteRule::new(
				"blank-floating-version",
				Condition::FloatingVersion,
				Edit::Replace {
					key: "version",
					value: json!(""),
				},
			),
			RewriteRule::new(
				"blank-floating-browser-version",
				Condition::FloatingVersion,
				Edit::Replace {
					key: "browserVersion",
					value: json!(""),
				},
			),
		])
	}

	pub fn rules(&self) -> &[RewriteRule] {
		&self.rules
	}

	/// Returns a rewritten copy of `document`. The input is left untouched.
	pub fn apply(&self, document: &Value, caps: &Capabilities) -> Value {
		let mut out = document.clone();
		for rule in self.rules.iter().filter(|r| r.when.matches(caps)) {
			tracing::trace!(target: "wdproxy.rewrite", rule = rule.name, "applying capability rule");
			rule.edit.apply(&mut out);
		}
		out
	}
}

/// Both rewrite stages of a new-session payload.
#[derive(Debug, Clone)]
pub struct CapabilityRewriter {
	session: RewritePipeline,
	forward: RewritePipeline,
}

impl Default for CapabilityRewriter {
	fn default() -> Self {
		Self::new(RewritePipeline::session_policy(), RewritePipeline::forward_policy())
	}
}

impl CapabilityRewriter {
	pub fn new(session: RewritePipeline, forward: RewritePipeline) -> Self {
		Self { session, forward }
	}

	/// Applies the session policy.
	pub fn rewrite(&self, original: &Value, caps: &Capabilities) -> Value {
		self.session.apply(original, caps)
	}

	/// Derives the payload actually sent to the hub from an already
	/// rewritten one.
	pub fn forwarded(&self, rewritten: &Value, caps: &Capabilities) -> Value {
		self.forward.apply(rewritten, caps)
	}
}

/// jq-style truthiness: everything except `null` and `false`.
fn truthy(value: &Value) -> bool {
	!matches!(value, Value::Null | Value::Bool(false))
}

/// Visits every object in the tree, children first.
pub(crate) fn walk_objects(value: &mut Value, f: &mut dyn FnMut(&mut Map<String, Value>)) {
	match value {
		Value::Array(items) => {
			for item in items {
				walk_objects(item, f);
			}
		}
		Value::Object(object) => {
			for child in object.values_mut() {
				walk_objects(child, f);
			}
			f(object);
		}
		_ => {}
	}
}

fn double_and_append(target: &mut Value, path: &[&str], items: &[Value]) {
	let Some((last, parents)) = path.split_last() else {
		return;
	};
	let mut node = target;
	for segment in parents {
		let Value::Object(object) = node else {
			return;
		};
		let child = object
			.entry(segment.to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if child.is_null() {
			*child = Value::Object(Map::new());
		}
		node = child;
	}
	let Value::Object(object) = node else {
		return;
	};
	let existing = match object.get(*last) {
		None | Some(Value::Null) => Vec::new(),
		Some(Value::Array(values)) => values.clone(),
		Some(_) => return,
	};
	let mut merged = existing.clone();
	merged.extend(existing);
	merged.extend(items.iter().cloned());
	object.insert(last.to_string(), Value::Array(merged));
}
