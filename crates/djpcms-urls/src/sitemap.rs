//! The sitemap: one node per absolute path, linked into a tree.
//!
//! Nodes live in an arena indexed by path. A node's parent is the nearest
//! existing node found by stripping trailing path segments; parent and child
//! links are recomputed for the whole tree after every insertion.

use std::collections::HashMap;

/// A sitemap entry.
#[derive(Debug, Clone)]
pub struct Node<V> {
	path: String,
	view: Option<V>,
	parent: Option<usize>,
	children: Vec<usize>,
}

impl<V> Node<V> {
	/// Absolute path.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// View bound to the path, if any.
	pub fn view(&self) -> Option<&V> {
		self.view.as_ref()
	}

	/// Whether this is the `/` node.
	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}
}

/// Path of the parent of `path`: the path with its last segment removed.
///
/// # Examples
///
/// ```
/// use djpcms_urls::sitemap::parent_path;
///
/// assert_eq!(parent_path("/blog/2024/"), Some("/blog/"));
/// assert_eq!(parent_path("/blog/post"), Some("/blog/"));
/// assert_eq!(parent_path("/blog/"), Some("/"));
/// assert_eq!(parent_path("/"), None);
/// ```
pub fn parent_path(path: &str) -> Option<&str> {
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() {
		return None;
	}
	trimmed.rfind('/').map(|idx| &path[..=idx])
}

fn normalize(path: &str) -> String {
	if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{path}")
	}
}

/// Arena tree of [`Node`]s.
#[derive(Debug, Clone)]
pub struct Sitemap<V> {
	nodes: Vec<Node<V>>,
	index: HashMap<String, usize>,
}

impl<V> Default for Sitemap<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V> Sitemap<V> {
	/// A sitemap holding only the root node.
	pub fn new() -> Self {
		let mut index = HashMap::new();
		index.insert("/".to_string(), 0);
		Self {
			nodes: vec![Node {
				path: "/".to_string(),
				view: None,
				parent: None,
				children: Vec::new(),
			}],
			index,
		}
	}

	/// Adds `path`, or binds `view` to the existing node. An existing view is
	/// only replaced by `Some`. Returns `true` when a node was created.
	pub fn insert(&mut self, path: &str, view: Option<V>) -> bool {
		let path = normalize(path);
		if let Some(&idx) = self.index.get(&path) {
			if view.is_some() {
				self.nodes[idx].view = view;
			}
			return false;
		}
		self.index.insert(path.clone(), self.nodes.len());
		self.nodes.push(Node {
			path,
			view,
			parent: None,
			children: Vec::new(),
		});
		self.rebuild();
		true
	}

	fn rebuild(&mut self) {
		for node in &mut self.nodes {
			node.children.clear();
		}
		for idx in 1..self.nodes.len() {
			let mut current = parent_path(&self.nodes[idx].path);
			let parent = loop {
				match current {
					Some(candidate) => {
						if let Some(&found) = self.index.get(candidate) {
							break found;
						}
						current = parent_path(candidate);
					}
					None => break 0,
				}
			};
			self.nodes[idx].parent = Some(parent);
			self.nodes[parent].children.push(idx);
		}
		let paths: Vec<String> = self.nodes.iter().map(|n| n.path.clone()).collect();
		for node in &mut self.nodes {
			node.children.sort_by(|a, b| paths[*a].cmp(&paths[*b]));
		}
	}

	/// Number of nodes, root included.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Whether only the root exists.
	pub fn is_empty(&self) -> bool {
		self.nodes.len() == 1
	}

	/// Whether `path` has a node.
	pub fn contains(&self, path: &str) -> bool {
		self.index.contains_key(&normalize(path))
	}

	/// The root node.
	pub fn root(&self) -> &Node<V> {
		&self.nodes[0]
	}

	/// Node at `path`.
	pub fn get(&self, path: &str) -> Option<&Node<V>> {
		self.index.get(&normalize(path)).map(|&idx| &self.nodes[idx])
	}

	/// Parent of the node at `path`.
	pub fn parent(&self, path: &str) -> Option<&Node<V>> {
		let node = self.get(path)?;
		node.parent.map(|idx| &self.nodes[idx])
	}

	/// Ancestors of the node at `path`, root first, excluding the node itself.
	pub fn ancestors(&self, path: &str) -> Vec<&Node<V>> {
		let mut chain = Vec::new();
		let mut current = self.get(path).and_then(|n| n.parent);
		while let Some(idx) = current {
			chain.push(&self.nodes[idx]);
			current = self.nodes[idx].parent;
		}
		chain.reverse();
		chain
	}

	/// Children of the node at `path`, sorted by path.
	pub fn children(&self, path: &str) -> Vec<&Node<V>> {
		self.get(path)
			.map(|node| node.children.iter().map(|&idx| &self.nodes[idx]).collect())
			.unwrap_or_default()
	}

	/// Every node, root first, then in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &Node<V>> {
		self.nodes.iter()
	}
}
