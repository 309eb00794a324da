//! Remote device mirror
//!
//! A [`Device`] keeps a local copy of a provider's tree and lets callers
//! observe it. Directory observers follow a node's child set, property
//! observers follow a single field of one entry, and path observers walk
//! the tree towards a target path, requesting directories level by level
//! until the target appears.
//!
//! All observation is reference counted. The first observer of a node
//! triggers the get-directory request, the last path observer of a
//! subtree releases it with an unsubscribe, and stream subscriptions are
//! shared per stream identifier.

use crate::connection::Connection;
use crate::error::{EmberError, EmberResult};
use crate::tree::{NodeEntry, ParameterEntry, Property, PropertyValue, TreeEntry};
use ember_asn1::{
    CommandType, GlowCommand, GlowElement, GlowNode, GlowParameter, GlowParameterContents,
    GlowQualifiedNode, GlowQualifiedParameter, GlowRoot, GlowRootElement, GlowStreamEntry,
};
use ember_core::{PathKey, Value};
use ember_transport::TransportLayer;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Handle returned by the observe methods, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Notification delivered to directory and path observers.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEvent {
    /// Path of the node the event is about.
    pub path: PathKey,
    /// True when the node was removed from the tree; the event is the
    /// observer's last.
    pub removed: bool,
}

type DirectoryCallback = Box<dyn FnMut(&DirectoryEvent) + Send>;
type PropertyCallback = Box<dyn FnMut(&PropertyValue) + Send>;

struct DirectoryObserver {
    id: SubscriptionId,
    callback: DirectoryCallback,
}

/// How a property observer wants its values delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Raw,
    EffectiveValue,
    EffectiveMinimum,
    EffectiveMaximum,
}

struct PropertyObserver {
    id: SubscriptionId,
    property: Property,
    transform: Transform,
    callback: PropertyCallback,
}

/// A pending walk towards a path that may not exist yet.
struct PathWalk {
    target: PathKey,
    satisfied: bool,
    callback: DirectoryCallback,
}

/// What a subscription id refers to, for unsubscribe bookkeeping.
enum SubscriptionTarget {
    Directory(PathKey),
    Property {
        path: PathKey,
        stream: Option<i64>,
    },
    Path(PathKey),
}

/// Consumer-side view of a remote Ember+ device.
pub struct Device<T: TransportLayer> {
    connection: Connection<T>,
    nodes: HashMap<PathKey, TreeEntry>,
    /// Stream identifier to parameter path, for stream entry dispatch.
    stream_parameters: HashMap<i64, PathKey>,
    directory_observers: HashMap<PathKey, Vec<DirectoryObserver>>,
    property_observers: HashMap<PathKey, Vec<PropertyObserver>>,
    path_walks: HashMap<SubscriptionId, PathWalk>,
    /// Per-prefix observer counts for path subscriptions.
    path_refcounts: HashMap<PathKey, usize>,
    /// Shared stream subscriptions, counted per stream identifier.
    stream_refcounts: HashMap<i64, usize>,
    subscriptions: HashMap<SubscriptionId, SubscriptionTarget>,
    /// Paths with a get-directory request in flight.
    pending_requests: HashSet<PathKey>,
    /// Nodes whose child set changed during the current batch.
    children_changed: HashSet<PathKey>,
    next_subscription: u64,
}

impl<T: TransportLayer> Device<T> {
    /// Wrap a connection and probe the link with an initial keepalive.
    pub async fn new(mut connection: Connection<T>) -> EmberResult<Self> {
        connection.send_keepalive_request().await?;

        let mut nodes = HashMap::new();
        nodes.insert(PathKey::root(), TreeEntry::Node(NodeEntry::root()));

        Ok(Self {
            connection,
            nodes,
            stream_parameters: HashMap::new(),
            directory_observers: HashMap::new(),
            property_observers: HashMap::new(),
            path_walks: HashMap::new(),
            path_refcounts: HashMap::new(),
            stream_refcounts: HashMap::new(),
            subscriptions: HashMap::new(),
            pending_requests: HashSet::new(),
            children_changed: HashSet::new(),
            next_subscription: 1,
        })
    }

    /// The root of the local tree mirror.
    pub fn root(&self) -> &NodeEntry {
        match self.nodes.get(&PathKey::root()) {
            Some(TreeEntry::Node(node)) => node,
            _ => unreachable!("root entry always exists"),
        }
    }

    /// Look up an entry by numeric path.
    pub fn node(&self, path: &PathKey) -> Option<&TreeEntry> {
        self.nodes.get(path)
    }

    /// The slash-joined identifier path of an entry, e.g. `"audio/gain"`.
    ///
    /// `None` if the entry or any ancestor identifier is unknown.
    pub fn identifier_path(&self, path: &PathKey) -> Option<String> {
        let mut parts = Vec::with_capacity(path.len());
        for prefix in path.prefixes() {
            parts.push(self.nodes.get(&prefix)?.identifier()?.to_string());
        }
        Some(parts.join("/"))
    }

    /// Look up an entry by slash-joined identifier path.
    pub fn node_by_identifier_path(&self, identifier_path: &str) -> Option<&TreeEntry> {
        let mut current = PathKey::root();

        for segment in identifier_path.split('/') {
            let node = self.nodes.get(&current)?.as_node()?;
            let number = node.children().find(|&number| {
                self.nodes
                    .get(&current.child(number))
                    .and_then(TreeEntry::identifier)
                    == Some(segment)
            })?;
            current = current.child(number);
        }

        self.nodes.get(&current)
    }

    /// See [`Connection::set_keepalive_interval`].
    pub fn set_keepalive_interval(&mut self, interval: Option<Duration>) {
        self.connection.set_keepalive_interval(interval);
    }

    /// See [`Connection::set_batch_size`].
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.connection.set_batch_size(batch_size);
    }

    fn next_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    /// Observe the child set of a known node.
    ///
    /// The callback fires once right away if the node's directory was
    /// already fetched, then again whenever the child set changes, and a
    /// final time with `removed` set when the node goes away. The first
    /// observer of a node triggers the get-directory request.
    pub fn observe_directory(
        &mut self,
        path: &PathKey,
        callback: impl FnMut(&DirectoryEvent) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        let node = self
            .nodes
            .get(path)
            .and_then(TreeEntry::as_node)
            .ok_or_else(|| EmberError::UsageError(format!("Not a known node: {}", path)))?;
        let children_received = node.children_received();

        let mut callback: DirectoryCallback = Box::new(callback);
        if children_received {
            callback(&DirectoryEvent {
                path: path.clone(),
                removed: false,
            });
        }

        let id = self.next_id();
        let first = !self.directory_observers.contains_key(path);
        self.directory_observers
            .entry(path.clone())
            .or_default()
            .push(DirectoryObserver { id, callback });
        self.subscriptions
            .insert(id, SubscriptionTarget::Directory(path.clone()));

        if first && !self.pending_requests.contains(path) {
            self.send_get_directory(path);
        }
        Ok(id)
    }

    /// Observe a single property of a known entry.
    ///
    /// The callback fires once right away if the property is currently
    /// set, then on every change. Observing the value of a streamed
    /// parameter subscribes to its stream while any observer remains.
    pub fn observe_property(
        &mut self,
        path: &PathKey,
        property: Property,
        callback: impl FnMut(&PropertyValue) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        self.observe_property_inner(path, property, Transform::Raw, Box::new(callback))
    }

    /// Observe a parameter's value with its transform applied; see
    /// [`ParameterEntry::effective_value`].
    pub fn observe_effective_value(
        &mut self,
        path: &PathKey,
        callback: impl FnMut(&PropertyValue) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        self.observe_property_inner(
            path,
            Property::Value,
            Transform::EffectiveValue,
            Box::new(callback),
        )
    }

    /// Observe a parameter's minimum with its transform applied.
    pub fn observe_effective_minimum(
        &mut self,
        path: &PathKey,
        callback: impl FnMut(&PropertyValue) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        self.observe_property_inner(
            path,
            Property::Minimum,
            Transform::EffectiveMinimum,
            Box::new(callback),
        )
    }

    /// Observe a parameter's maximum with its transform applied.
    pub fn observe_effective_maximum(
        &mut self,
        path: &PathKey,
        callback: impl FnMut(&PropertyValue) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        self.observe_property_inner(
            path,
            Property::Maximum,
            Transform::EffectiveMaximum,
            Box::new(callback),
        )
    }

    fn observe_property_inner(
        &mut self,
        path: &PathKey,
        property: Property,
        transform: Transform,
        mut callback: PropertyCallback,
    ) -> EmberResult<SubscriptionId> {
        if path.is_empty() {
            return Err(EmberError::UsageError(
                "The root node has no observable properties".to_string(),
            ));
        }
        let entry = self
            .nodes
            .get(path)
            .ok_or_else(|| EmberError::UsageError(format!("Not a known entry: {}", path)))?;

        let stream = match (property, entry.as_parameter()) {
            (Property::Value, Some(parameter)) => parameter.stream_identifier(),
            _ => None,
        };
        if let Some(current) = current_property_value(entry, property, transform) {
            callback(&current);
        }

        let id = self.next_id();
        self.property_observers
            .entry(path.clone())
            .or_default()
            .push(PropertyObserver {
                id,
                property,
                transform,
                callback,
            });
        self.subscriptions.insert(
            id,
            SubscriptionTarget::Property {
                path: path.clone(),
                stream,
            },
        );

        if let Some(stream) = stream {
            let count = self.stream_refcounts.entry(stream).or_insert(0);
            *count += 1;
            if *count == 1 {
                self.send_subscribe(path);
            }
        }
        Ok(id)
    }

    /// Observe a path that may not exist yet.
    ///
    /// Every prefix of the path is reference counted while the observer
    /// lives; the device walks the tree towards the target, fetching one
    /// directory level at a time, and fires the callback when the target
    /// appears (or right away if it already exists). When the last
    /// observer of a prefix unsubscribes, the released subtree is dropped
    /// and an unsubscribe is sent for it.
    pub fn observe_path(
        &mut self,
        path: &PathKey,
        callback: impl FnMut(&DirectoryEvent) + Send + 'static,
    ) -> EmberResult<SubscriptionId> {
        if path.is_empty() {
            return Err(EmberError::UsageError(
                "Expected a non-empty path".to_string(),
            ));
        }

        let mut first = false;
        for prefix in path.prefixes() {
            let count = self.path_refcounts.entry(prefix).or_insert(0);
            *count += 1;
            if *count == 1 {
                first = true;
            }
        }

        let mut callback: DirectoryCallback = Box::new(callback);
        let satisfied = self.nodes.contains_key(path);
        if satisfied {
            callback(&DirectoryEvent {
                path: path.clone(),
                removed: false,
            });
        }

        let id = self.next_id();
        self.path_walks.insert(
            id,
            PathWalk {
                target: path.clone(),
                satisfied,
                callback,
            },
        );
        self.subscriptions
            .insert(id, SubscriptionTarget::Path(path.clone()));

        if first && !satisfied {
            self.request_discovery(path);
        }
        Ok(id)
    }

    /// Cancel a subscription. Idempotent: a handle that is already spent,
    /// including one invalidated by a node removal, is a no-op.
    ///
    /// Side effects happen immediately and at most once: the last stream
    /// observer sends the stream unsubscribe, the last path observer of a
    /// prefix drops the released subtree and sends its unsubscribe.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(target) = self.subscriptions.remove(&id) else {
            log::debug!("Ignoring unsubscribe for an inactive handle");
            return;
        };

        match target {
            SubscriptionTarget::Directory(path) => {
                if let Some(observers) = self.directory_observers.get_mut(&path) {
                    observers.retain(|observer| observer.id != id);
                    if observers.is_empty() {
                        self.directory_observers.remove(&path);
                    }
                }
            }
            SubscriptionTarget::Property { path, stream } => {
                if let Some(observers) = self.property_observers.get_mut(&path) {
                    observers.retain(|observer| observer.id != id);
                    if observers.is_empty() {
                        self.property_observers.remove(&path);
                    }
                }
                if let Some(stream) = stream {
                    if let Some(count) = self.stream_refcounts.get_mut(&stream) {
                        *count -= 1;
                        if *count == 0 {
                            self.stream_refcounts.remove(&stream);
                            if self.nodes.contains_key(&path) {
                                self.send_unsubscribe(&path, false);
                            }
                        }
                    }
                }
            }
            SubscriptionTarget::Path(path) => {
                self.path_walks.remove(&id);
                self.release_path(&path);
            }
        }
    }

    /// Request a fresh directory listing for a known node.
    pub fn get_directory(&mut self, path: &PathKey) -> EmberResult<()> {
        match self.nodes.get(path) {
            Some(TreeEntry::Node(_)) => {
                self.send_get_directory(path);
                Ok(())
            }
            _ => Err(EmberError::UsageError(format!("Not a known node: {}", path))),
        }
    }

    /// Queue a raw value write for a known parameter.
    pub fn set_value(&mut self, path: &PathKey, value: Value) -> EmberResult<()> {
        if self
            .nodes
            .get(path)
            .and_then(TreeEntry::as_parameter)
            .is_none()
        {
            return Err(EmberError::UsageError(format!(
                "Not a known parameter: {}",
                path
            )));
        }

        self.connection
            .enqueue(GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: Some(GlowParameterContents::with_value(value)),
                children: None,
            }));
        Ok(())
    }

    /// Queue a value write with the parameter's inverse transform
    /// applied; see [`ParameterEntry::from_effective_value`].
    pub fn set_effective_value(&mut self, path: &PathKey, value: &Value) -> EmberResult<()> {
        let parameter = self
            .nodes
            .get(path)
            .and_then(TreeEntry::as_parameter)
            .ok_or_else(|| {
                EmberError::UsageError(format!("Not a known parameter: {}", path))
            })?;
        let raw = parameter.from_effective_value(value)?;
        self.set_value(path, raw)
    }

    /// Drive the device one turn: send queued requests, wait for the next
    /// inbound message, apply it to the tree and fire observers.
    pub async fn poll(&mut self) -> EmberResult<()> {
        let roots = self.connection.poll().await?;
        let result = self.dispatch_roots(roots);
        self.process_children_changed();
        self.advance_path_walks();
        self.connection.flush().await?;
        result
    }

    /// Poll until an error occurs.
    pub async fn run(&mut self) -> EmberResult<()> {
        loop {
            self.poll().await?;
        }
    }

    /// Send everything queued without waiting for inbound data.
    pub async fn flush(&mut self) -> EmberResult<()> {
        self.connection.flush().await
    }

    /// Close the underlying connection.
    pub async fn close(&mut self) -> EmberResult<()> {
        self.connection.close().await
    }

    fn send_get_directory(&mut self, path: &PathKey) {
        let command = GlowCommand::new(CommandType::GetDirectory);
        let element = if path.is_empty() {
            GlowRootElement::Command(command)
        } else {
            GlowRootElement::QualifiedNode(GlowQualifiedNode {
                path: path.clone(),
                contents: None,
                children: Some(vec![GlowElement::Command(command)]),
            })
        };

        log::debug!("Requesting directory of {}", path);
        self.connection.enqueue(element);
        self.pending_requests.insert(path.clone());
    }

    fn send_subscribe(&mut self, path: &PathKey) {
        let command = GlowElement::Command(GlowCommand::new(CommandType::Subscribe));
        self.connection
            .enqueue(GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: None,
                children: Some(vec![command]),
            }));
    }

    fn send_unsubscribe(&mut self, path: &PathKey, node: bool) {
        let command = GlowElement::Command(GlowCommand::new(CommandType::Unsubscribe));
        let element = if node {
            GlowRootElement::QualifiedNode(GlowQualifiedNode {
                path: path.clone(),
                contents: None,
                children: Some(vec![command]),
            })
        } else {
            GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: None,
                children: Some(vec![command]),
            })
        };
        self.connection.enqueue(element);
    }

    /// Request the directory of the deepest known ancestor of `target`,
    /// unless its listing is already complete or in flight.
    fn request_discovery(&mut self, target: &PathKey) {
        let mut deepest = PathKey::root();
        for prefix in target.prefixes() {
            if self.nodes.contains_key(&prefix) {
                deepest = prefix;
            } else {
                break;
            }
        }
        if deepest == *target {
            return;
        }

        let fetched = self
            .nodes
            .get(&deepest)
            .and_then(TreeEntry::as_node)
            .map(NodeEntry::children_received)
            .unwrap_or(true);
        if !fetched && !self.pending_requests.contains(&deepest) {
            self.send_get_directory(&deepest);
        }
    }

    /// Drop one reference from every prefix of `path`. The shallowest
    /// prefix reaching zero is unsubscribed and its subtree removed.
    fn release_path(&mut self, path: &PathKey) {
        let mut released = None;
        for prefix in path.prefixes() {
            if let Some(count) = self.path_refcounts.get_mut(&prefix) {
                *count -= 1;
                if *count == 0 {
                    self.path_refcounts.remove(&prefix);
                    if released.is_none() {
                        released = Some(prefix);
                    }
                }
            }
        }

        if let Some(prefix) = released {
            match self.nodes.get(&prefix) {
                Some(TreeEntry::Node(_)) => self.send_unsubscribe(&prefix, true),
                Some(TreeEntry::Parameter(_)) => self.send_unsubscribe(&prefix, false),
                None => return,
            }
            self.remove_subtree(&prefix);
        }
    }

    fn dispatch_roots(&mut self, roots: Vec<GlowRoot>) -> EmberResult<()> {
        for root in roots {
            match root {
                GlowRoot::Elements(elements) => {
                    for element in elements {
                        if let Err(error) = self.handle_root_element(&element) {
                            match error {
                                EmberError::ProtocolViolation(_)
                                | EmberError::TreeInconsistency(_) => return Err(error),
                                other => {
                                    log::warn!("Skipping root element: {}", other);
                                }
                            }
                        }
                    }
                }
                GlowRoot::Streams(entries) => {
                    for entry in entries {
                        self.handle_stream_entry(entry);
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_root_element(&mut self, element: &GlowRootElement) -> EmberResult<()> {
        match element {
            GlowRootElement::Node(node) => self.handle_node(node, &PathKey::root()),
            GlowRootElement::Parameter(parameter) => {
                self.handle_parameter(parameter, &PathKey::root())
            }
            GlowRootElement::QualifiedNode(node) => self.handle_qualified_node(node),
            GlowRootElement::QualifiedParameter(parameter) => {
                self.handle_qualified_parameter(parameter)
            }
            GlowRootElement::Command(_) => Err(EmberError::TreeInconsistency(
                "Received a command from the provider".to_string(),
            )),
        }
    }

    fn handle_element(&mut self, element: &GlowElement, parent: &PathKey) -> EmberResult<()> {
        match element {
            GlowElement::Node(node) => self.handle_node(node, parent),
            GlowElement::Parameter(parameter) => self.handle_parameter(parameter, parent),
            GlowElement::Command(_) => Err(EmberError::TreeInconsistency(
                "Received a command from the provider".to_string(),
            )),
        }
    }

    fn handle_node(&mut self, element: &GlowNode, parent: &PathKey) -> EmberResult<()> {
        let path = parent.child(element.number);

        // a kind flip or identifier change tears the subtree down
        let recreate = match self.nodes.get(&path) {
            None => true,
            Some(TreeEntry::Parameter(_)) => {
                self.remove_subtree(&path);
                true
            }
            Some(TreeEntry::Node(node)) => {
                let incoming = element.contents.as_ref().and_then(|c| c.identifier.as_ref());
                let changed = match (node.identifier(), incoming) {
                    (Some(current), Some(incoming)) => current != incoming.as_str(),
                    _ => false,
                };
                if changed {
                    self.remove_subtree(&path);
                }
                changed
            }
        };

        if recreate {
            self.ensure_node_parent(parent)?;
            let node = NodeEntry::new(path.clone(), element.contents.as_ref());
            self.register(TreeEntry::Node(node));
        } else if let Some(contents) = &element.contents {
            let changes = match self.nodes.get_mut(&path).and_then(TreeEntry::as_node_mut) {
                Some(node) => node.update_from(contents),
                None => Vec::new(),
            };
            let went_offline = changes
                .iter()
                .any(|(property, value)| {
                    *property == Property::IsOnline && *value == PropertyValue::Bool(false)
                });
            self.dispatch_property_changes(&path, changes);
            if went_offline {
                self.remove_children(&path);
            }
        }

        if let Some(children) = &element.children {
            for child in children {
                self.handle_element(child, &path)?;
            }
        }
        Ok(())
    }

    fn handle_parameter(&mut self, element: &GlowParameter, parent: &PathKey) -> EmberResult<()> {
        let path = parent.child(element.number);

        let recreate = match self.nodes.get(&path) {
            None => true,
            Some(TreeEntry::Node(_)) => {
                self.remove_subtree(&path);
                true
            }
            Some(TreeEntry::Parameter(_)) => false,
        };

        if recreate {
            self.ensure_node_parent(parent)?;
            let parameter = ParameterEntry::new(path.clone(), element.contents.as_ref());
            self.register(TreeEntry::Parameter(parameter));
        } else if let Some(contents) = &element.contents {
            let changes = match self
                .nodes
                .get_mut(&path)
                .and_then(TreeEntry::as_parameter_mut)
            {
                Some(parameter) => parameter.update_from(contents),
                None => Vec::new(),
            };
            self.dispatch_property_changes(&path, changes);
        }

        // parameters have no children worth following
        Ok(())
    }

    fn handle_qualified_node(&mut self, element: &GlowQualifiedNode) -> EmberResult<()> {
        let path = &element.path;
        match self.nodes.get(path) {
            None => {
                // an update we never asked for; tell the provider to stop
                log::debug!("Unsubscribing unknown node {}", path);
                self.send_unsubscribe(path, true);
                return Ok(());
            }
            Some(TreeEntry::Parameter(_)) => {
                log::warn!("Ignoring node update for parameter {}", path);
                return Ok(());
            }
            Some(TreeEntry::Node(_)) => {}
        }

        if let Some(contents) = &element.contents {
            let changes = match self.nodes.get_mut(path).and_then(TreeEntry::as_node_mut) {
                Some(node) => node.update_from(contents),
                None => Vec::new(),
            };
            let went_offline = changes
                .iter()
                .any(|(property, value)| {
                    *property == Property::IsOnline && *value == PropertyValue::Bool(false)
                });
            self.dispatch_property_changes(path, changes);
            if went_offline {
                self.remove_children(path);
            }
        }

        if let Some(children) = &element.children {
            for child in children {
                self.handle_element(child, path)?;
            }
        }
        Ok(())
    }

    fn handle_qualified_parameter(&mut self, element: &GlowQualifiedParameter) -> EmberResult<()> {
        let path = &element.path;
        match self.nodes.get(path) {
            None => {
                log::debug!("Unsubscribing unknown parameter {}", path);
                self.send_unsubscribe(path, false);
                return Ok(());
            }
            Some(TreeEntry::Node(_)) => {
                log::warn!("Ignoring parameter update for node {}", path);
                return Ok(());
            }
            Some(TreeEntry::Parameter(_)) => {}
        }

        if let Some(contents) = &element.contents {
            let changes = match self
                .nodes
                .get_mut(path)
                .and_then(TreeEntry::as_parameter_mut)
            {
                Some(parameter) => parameter.update_from(contents),
                None => Vec::new(),
            };
            self.dispatch_property_changes(path, changes);
        }
        Ok(())
    }

    fn handle_stream_entry(&mut self, entry: GlowStreamEntry) {
        let Some(path) = self.stream_parameters.get(&entry.stream_identifier).cloned() else {
            log::debug!("Dropping stream entry {}", entry.stream_identifier);
            return;
        };

        // stream updates fire unconditionally, even for repeated values
        let change = match self
            .nodes
            .get_mut(&path)
            .and_then(TreeEntry::as_parameter_mut)
        {
            Some(parameter) => parameter.update_value(entry.value),
            None => return,
        };
        self.dispatch_property_changes(&path, vec![change]);
    }

    fn ensure_node_parent(&mut self, parent: &PathKey) -> EmberResult<()> {
        match self.nodes.get(parent) {
            Some(TreeEntry::Node(_)) => Ok(()),
            Some(TreeEntry::Parameter(_)) => Err(EmberError::TreeInconsistency(format!(
                "Expected a node at {}",
                parent
            ))),
            None => Err(EmberError::TreeInconsistency(format!(
                "Could not find parent {}",
                parent
            ))),
        }
    }

    fn register(&mut self, entry: TreeEntry) {
        let path = entry.path().clone();

        if let TreeEntry::Parameter(parameter) = &entry {
            if let Some(stream) = parameter.stream_identifier() {
                self.stream_parameters.insert(stream, path.clone());
            }
        }

        if let (Some(parent), Some(number)) = (path.parent(), path.number()) {
            if let Some(TreeEntry::Node(node)) = self.nodes.get_mut(&parent) {
                node.children.insert(number);
            }
            self.children_changed.insert(parent);
        }

        self.nodes.insert(path, entry);
    }

    fn remove_children(&mut self, path: &PathKey) {
        let numbers: Vec<u32> = match self.nodes.get(path).and_then(TreeEntry::as_node) {
            Some(node) => node.children().collect(),
            None => return,
        };
        for number in numbers {
            self.remove_subtree(&path.child(number));
        }
    }

    /// Remove an entry and all its descendants, delivering a final
    /// removal event to every observer along the way.
    fn remove_subtree(&mut self, path: &PathKey) {
        let Some(entry) = self.nodes.remove(path) else {
            return;
        };

        if let TreeEntry::Node(node) = &entry {
            let numbers: Vec<u32> = node.children().collect();
            for number in numbers {
                self.remove_subtree(&path.child(number));
            }
        }

        if let TreeEntry::Parameter(parameter) = &entry {
            if let Some(stream) = parameter.stream_identifier() {
                if self.stream_parameters.get(&stream) == Some(path) {
                    self.stream_parameters.remove(&stream);
                }
                self.stream_refcounts.remove(&stream);
            }
        }

        if let (Some(parent), Some(number)) = (path.parent(), path.number()) {
            if let Some(TreeEntry::Node(node)) = self.nodes.get_mut(&parent) {
                node.children.remove(&number);
                self.children_changed.insert(parent);
            }
        }

        if let Some(mut observers) = self.directory_observers.remove(path) {
            let event = DirectoryEvent {
                path: path.clone(),
                removed: true,
            };
            for observer in observers.iter_mut() {
                (observer.callback)(&event);
                self.subscriptions.remove(&observer.id);
            }
        }
        if let Some(observers) = self.property_observers.remove(path) {
            for observer in &observers {
                self.subscriptions.remove(&observer.id);
            }
        }
    }

    fn dispatch_property_changes(
        &mut self,
        path: &PathKey,
        changes: Vec<(Property, PropertyValue)>,
    ) {
        if changes.is_empty() {
            return;
        }
        let Some(mut observers) = self.property_observers.remove(path) else {
            return;
        };

        for (property, value) in &changes {
            for observer in observers.iter_mut() {
                if observer.property != *property {
                    continue;
                }
                match observer.transform {
                    Transform::Raw => (observer.callback)(value),
                    transform => {
                        let Some(parameter) =
                            self.nodes.get(path).and_then(TreeEntry::as_parameter)
                        else {
                            continue;
                        };
                        let effective = match transform {
                            Transform::EffectiveValue => parameter.effective_value(),
                            Transform::EffectiveMinimum => parameter.effective_minimum(),
                            Transform::EffectiveMaximum => parameter.effective_maximum(),
                            Transform::Raw => continue,
                        };
                        (observer.callback)(&effective_property(effective));
                    }
                }
            }
        }

        self.property_observers.insert(path.clone(), observers);
    }

    /// Mark the changed nodes' directories complete and notify their
    /// observers, once per node for the whole batch.
    fn process_children_changed(&mut self) {
        let changed: Vec<PathKey> = self.children_changed.drain().collect();

        for path in changed {
            self.pending_requests.remove(&path);

            match self.nodes.get_mut(&path).and_then(TreeEntry::as_node_mut) {
                Some(node) => node.children_received = true,
                // removed nodes already delivered their final event
                None => continue,
            }

            if let Some(mut observers) = self.directory_observers.remove(&path) {
                let event = DirectoryEvent {
                    path: path.clone(),
                    removed: false,
                };
                for observer in observers.iter_mut() {
                    (observer.callback)(&event);
                }
                self.directory_observers.insert(path, observers);
            }
        }
    }

    /// Fire path observers whose target appeared or vanished, and keep
    /// the discovery of unsatisfied targets moving.
    fn advance_path_walks(&mut self) {
        let mut walks = std::mem::take(&mut self.path_walks);
        let mut discover = Vec::new();

        for walk in walks.values_mut() {
            let exists = self.nodes.contains_key(&walk.target);
            if walk.satisfied && !exists {
                walk.satisfied = false;
                (walk.callback)(&DirectoryEvent {
                    path: walk.target.clone(),
                    removed: true,
                });
            } else if !walk.satisfied && exists {
                walk.satisfied = true;
                (walk.callback)(&DirectoryEvent {
                    path: walk.target.clone(),
                    removed: false,
                });
            } else if !exists {
                discover.push(walk.target.clone());
            }
        }

        self.path_walks = walks;
        for target in discover {
            self.request_discovery(&target);
        }
    }
}

fn effective_property(value: Option<Value>) -> PropertyValue {
    match value {
        Some(value) => PropertyValue::Value(value),
        None => PropertyValue::None,
    }
}

/// The current value of a property, for the immediate callback on
/// registration. `None` when the property is unset.
fn current_property_value(
    entry: &TreeEntry,
    property: Property,
    transform: Transform,
) -> Option<PropertyValue> {
    match transform {
        Transform::EffectiveValue => {
            let parameter = entry.as_parameter()?;
            parameter
                .value()
                .map(|_| effective_property(parameter.effective_value()))
        }
        Transform::EffectiveMinimum => {
            let parameter = entry.as_parameter()?;
            parameter
                .minimum()
                .map(|_| effective_property(parameter.effective_minimum()))
        }
        Transform::EffectiveMaximum => {
            let parameter = entry.as_parameter()?;
            parameter
                .maximum()
                .map(|_| effective_property(parameter.effective_maximum()))
        }
        Transform::Raw => raw_property_value(entry, property),
    }
}

fn raw_property_value(entry: &TreeEntry, property: Property) -> Option<PropertyValue> {
    match entry {
        TreeEntry::Node(node) => match property {
            Property::Identifier => node
                .identifier()
                .map(|identifier| PropertyValue::String(identifier.to_string())),
            Property::Description => node
                .description()
                .map(|description| PropertyValue::String(description.to_string())),
            Property::IsRoot => node.is_root.map(PropertyValue::Bool),
            Property::IsOnline => Some(PropertyValue::Bool(node.is_online())),
            _ => None,
        },
        TreeEntry::Parameter(parameter) => match property {
            Property::Identifier => parameter
                .identifier()
                .map(|identifier| PropertyValue::String(identifier.to_string())),
            Property::Description => parameter
                .description()
                .map(|description| PropertyValue::String(description.to_string())),
            Property::Value => parameter.value().cloned().map(PropertyValue::Value),
            Property::Minimum => parameter.minimum().cloned().map(PropertyValue::MinMax),
            Property::Maximum => parameter.maximum().cloned().map(PropertyValue::MinMax),
            Property::Access => parameter.access().map(PropertyValue::Access),
            Property::Format => parameter
                .format()
                .map(|format| PropertyValue::String(format.to_string())),
            Property::Enumeration => parameter
                .enumeration()
                .map(|enumeration| PropertyValue::String(enumeration.to_string())),
            Property::Factor => parameter.factor().map(PropertyValue::Integer),
            Property::IsOnline => Some(PropertyValue::Bool(parameter.is_online())),
            Property::Formula => parameter
                .formula()
                .map(|formula| PropertyValue::String(formula.to_string())),
            Property::Step => parameter.step().map(PropertyValue::Integer),
            Property::Default => parameter.default().cloned().map(PropertyValue::Value),
            Property::Type => parameter.parameter_type().map(PropertyValue::Type),
            Property::StreamIdentifier => {
                parameter.stream_identifier().map(PropertyValue::Integer)
            }
            Property::EnumMap => parameter
                .enum_map()
                .map(|map| PropertyValue::EnumMap(map.to_vec())),
            Property::StreamDescriptor => parameter
                .stream_descriptor()
                .copied()
                .map(PropertyValue::StreamDescriptor),
            Property::IsRoot => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockHandle, MockTransport};
    use ember_asn1::{GlowNodeContents, Tlv};
    use ember_s101::{
        encode_ember_payload, parse_message, FragmentReassembler, FrameDecoder, S101Message,
    };
    use std::sync::{Arc, Mutex};

    async fn new_device() -> (Device<MockTransport>, MockHandle) {
        let (transport, handle) = MockTransport::new();
        let device = Device::new(Connection::new(transport)).await.unwrap();
        // drop the initial keepalive probe
        handle.take_sent();
        (device, handle)
    }

    /// Decode everything sent so far back into root elements.
    fn sent_elements(handle: &MockHandle) -> Vec<GlowRootElement> {
        let mut decoder = FrameDecoder::new();
        let mut reassembler = FragmentReassembler::new();
        let mut elements = Vec::new();

        for write in handle.take_sent() {
            decoder.feed(&write);
            while let Some(frame) = decoder.parse().unwrap() {
                match parse_message(&frame).unwrap() {
                    S101Message::KeepaliveRequest | S101Message::KeepaliveResponse => {}
                    message => {
                        let Some(payload) = reassembler.handle(message).unwrap() else {
                            continue;
                        };
                        let mut pos = 0;
                        while pos < payload.len() {
                            let (tlv, next) = Tlv::decode_from(&payload, pos).unwrap();
                            pos = next;
                            match GlowRoot::decode(&tlv).unwrap() {
                                GlowRoot::Elements(batch) => elements.extend(batch),
                                GlowRoot::Streams(_) => panic!("unexpected stream root"),
                            }
                        }
                    }
                }
            }
        }
        elements
    }

    fn push_glow(handle: &MockHandle, root: GlowRoot) {
        let payload = root.encode().encode().unwrap();
        handle.push_incoming(&encode_ember_payload(&payload).unwrap());
    }

    fn push_elements(handle: &MockHandle, elements: Vec<GlowRootElement>) {
        push_glow(handle, GlowRoot::Elements(elements));
    }

    fn node_with_children(number: u32, identifier: &str, children: Vec<GlowElement>) -> GlowNode {
        GlowNode {
            number,
            contents: Some(GlowNodeContents {
                identifier: Some(identifier.to_string()),
                ..Default::default()
            }),
            children: Some(children),
        }
    }

    fn parameter_element(number: u32, contents: GlowParameterContents) -> GlowElement {
        GlowElement::Parameter(GlowParameter {
            number,
            contents: Some(contents),
            children: None,
        })
    }

    fn unsubscribe_commands(elements: &[GlowRootElement]) -> Vec<PathKey> {
        elements
            .iter()
            .filter_map(|element| {
                let (path, children) = match element {
                    GlowRootElement::QualifiedNode(node) => (&node.path, &node.children),
                    GlowRootElement::QualifiedParameter(parameter) => {
                        (&parameter.path, &parameter.children)
                    }
                    _ => return None,
                };
                match children.as_deref() {
                    Some([GlowElement::Command(command)])
                        if command.number == CommandType::Unsubscribe =>
                    {
                        Some(path.clone())
                    }
                    _ => None,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_initial_keepalive() {
        let (transport, handle) = MockTransport::new();
        let _device = Device::new(Connection::new(transport)).await.unwrap();

        let sent = handle.take_sent();
        assert_eq!(sent.len(), 1);
        let mut decoder = FrameDecoder::new();
        decoder.feed(&sent[0]);
        let frame = decoder.parse().unwrap().unwrap();
        assert_eq!(parse_message(&frame).unwrap(), S101Message::KeepaliveRequest);
    }

    #[tokio::test]
    async fn test_observe_directory_requests_once() {
        let (mut device, handle) = new_device().await;
        let root = PathKey::root();

        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let count = first.clone();
        device
            .observe_directory(&root, move |_| *count.lock().unwrap() += 1)
            .unwrap();
        let count = second.clone();
        device
            .observe_directory(&root, move |_| *count.lock().unwrap() += 1)
            .unwrap();
        device.flush().await.unwrap();

        // one get-directory for both observers
        let elements = sent_elements(&handle);
        assert_eq!(elements.len(), 1);
        assert!(matches!(
            &elements[0],
            GlowRootElement::Command(command) if command.number == CommandType::GetDirectory
        ));

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(1, "audio", vec![]))],
        );
        device.poll().await.unwrap();

        assert_eq!(*first.lock().unwrap(), 1);
        assert_eq!(*second.lock().unwrap(), 1);
        assert!(device.root().children_received());
        assert!(device.node(&PathKey::new(&[1])).is_some());

        // a later observer fires immediately and requests nothing
        let third = Arc::new(Mutex::new(0));
        let count = third.clone();
        device
            .observe_directory(&root, move |_| *count.lock().unwrap() += 1)
            .unwrap();
        device.flush().await.unwrap();
        assert_eq!(*third.lock().unwrap(), 1);
        assert!(sent_elements(&handle).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_qualified_parameter_unsubscribed() {
        let (mut device, handle) = new_device().await;

        push_elements(
            &handle,
            vec![GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: PathKey::new(&[4, 2]),
                contents: Some(GlowParameterContents::with_value(Value::Integer(1))),
                children: None,
            })],
        );
        device.poll().await.unwrap();

        // exactly one unsubscribe goes out and the tree stays untouched
        let elements = sent_elements(&handle);
        assert_eq!(unsubscribe_commands(&elements), vec![PathKey::new(&[4, 2])]);
        assert_eq!(elements.len(), 1);
        assert!(device.node(&PathKey::new(&[4])).is_none());
        assert!(device.node(&PathKey::new(&[4, 2])).is_none());
    }

    #[tokio::test]
    async fn test_command_from_provider_is_fatal() {
        let (mut device, handle) = new_device().await;

        push_elements(
            &handle,
            vec![GlowRootElement::Command(GlowCommand::new(
                CommandType::GetDirectory,
            ))],
        );
        let error = device.poll().await.unwrap_err();
        assert!(matches!(error, EmberError::TreeInconsistency(_)));
    }

    #[tokio::test]
    async fn test_observe_path_walks_the_tree() {
        let (mut device, handle) = new_device().await;
        let target = PathKey::new(&[1, 2]);

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        device
            .observe_path(&target, move |event| {
                seen.lock().unwrap().push(event.clone())
            })
            .unwrap();
        device.flush().await.unwrap();

        // walk starts at the root
        let elements = sent_elements(&handle);
        assert!(matches!(&elements[..], [GlowRootElement::Command(_)]));

        // root listing reveals node 1; the walk asks for its directory
        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(1, "audio", vec![]))],
        );
        device.poll().await.unwrap();
        let elements = sent_elements(&handle);
        assert!(matches!(
            &elements[..],
            [GlowRootElement::QualifiedNode(node)] if node.path == PathKey::new(&[1])
        ));
        assert!(events.lock().unwrap().is_empty());

        // node 1's listing reveals the target
        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(
                1,
                "audio",
                vec![GlowElement::Node(GlowNode {
                    number: 2,
                    contents: None,
                    children: None,
                })],
            ))],
        );
        device.poll().await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, target);
        assert!(!events[0].removed);
    }

    #[tokio::test]
    async fn test_path_refcounting_shares_prefixes() {
        let (mut device, handle) = new_device().await;
        let target = PathKey::new(&[1, 2]);

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(
                1,
                "audio",
                vec![GlowElement::Node(GlowNode {
                    number: 2,
                    contents: None,
                    children: None,
                })],
            ))],
        );
        device.poll().await.unwrap();
        handle.take_sent();

        let first = device.observe_path(&target, |_| {}).unwrap();
        let second = device.observe_path(&target, |_| {}).unwrap();
        device.flush().await.unwrap();
        assert!(sent_elements(&handle).is_empty());

        // one observer left: the subtree stays
        device.unsubscribe(first);
        device.flush().await.unwrap();
        assert!(sent_elements(&handle).is_empty());
        assert!(device.node(&target).is_some());

        // last observer gone: one unsubscribe for the shallowest released
        // prefix, subtree dropped
        device.unsubscribe(second);
        device.flush().await.unwrap();
        let elements = sent_elements(&handle);
        assert_eq!(unsubscribe_commands(&elements), vec![PathKey::new(&[1])]);
        assert_eq!(elements.len(), 1);
        assert!(device.node(&PathKey::new(&[1])).is_none());
        assert!(device.node(&target).is_none());

        // the spent handle is a no-op: no error, no repeated emission
        device.unsubscribe(second);
        device.unsubscribe(first);
        device.flush().await.unwrap();
        assert!(sent_elements(&handle).is_empty());
    }

    #[tokio::test]
    async fn test_property_observer_fires_on_change() {
        let (mut device, handle) = new_device().await;
        let path = PathKey::new(&[1]);

        push_elements(
            &handle,
            vec![GlowRootElement::Parameter(GlowParameter {
                number: 1,
                contents: Some(GlowParameterContents::with_value(Value::Integer(1))),
                children: None,
            })],
        );
        device.poll().await.unwrap();

        let values = Arc::new(Mutex::new(Vec::new()));
        let seen = values.clone();
        device
            .observe_property(&path, Property::Value, move |value| {
                seen.lock().unwrap().push(value.clone())
            })
            .unwrap();
        // registration fires with the current value
        assert_eq!(
            *values.lock().unwrap(),
            vec![PropertyValue::Value(Value::Integer(1))]
        );

        push_elements(
            &handle,
            vec![GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: Some(GlowParameterContents::with_value(Value::Integer(2))),
                children: None,
            })],
        );
        device.poll().await.unwrap();
        assert_eq!(values.lock().unwrap().len(), 2);

        // an identical update changes nothing
        push_elements(
            &handle,
            vec![GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: Some(GlowParameterContents::with_value(Value::Integer(2))),
                children: None,
            })],
        );
        device.poll().await.unwrap();
        assert_eq!(values.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_effective_value_observer() {
        let (mut device, handle) = new_device().await;
        let path = PathKey::new(&[1]);

        push_elements(
            &handle,
            vec![GlowRootElement::Parameter(GlowParameter {
                number: 1,
                contents: Some(GlowParameterContents {
                    value: Some(Value::Integer(5)),
                    factor: Some(10),
                    ..Default::default()
                }),
                children: None,
            })],
        );
        device.poll().await.unwrap();

        let values = Arc::new(Mutex::new(Vec::new()));
        let seen = values.clone();
        device
            .observe_effective_value(&path, move |value| {
                seen.lock().unwrap().push(value.clone())
            })
            .unwrap();
        assert_eq!(
            *values.lock().unwrap(),
            vec![PropertyValue::Value(Value::Real(0.5))]
        );

        push_elements(
            &handle,
            vec![GlowRootElement::QualifiedParameter(GlowQualifiedParameter {
                path: path.clone(),
                contents: Some(GlowParameterContents::with_value(Value::Integer(20))),
                children: None,
            })],
        );
        device.poll().await.unwrap();
        assert_eq!(
            values.lock().unwrap().last(),
            Some(&PropertyValue::Value(Value::Real(2.0)))
        );
    }

    #[tokio::test]
    async fn test_stream_subscription_is_shared() {
        let (mut device, handle) = new_device().await;
        let path = PathKey::new(&[1]);

        push_elements(
            &handle,
            vec![GlowRootElement::Parameter(GlowParameter {
                number: 1,
                contents: Some(GlowParameterContents {
                    stream_identifier: Some(7),
                    ..Default::default()
                }),
                children: None,
            })],
        );
        device.poll().await.unwrap();
        handle.take_sent();

        let values = Arc::new(Mutex::new(Vec::new()));
        let seen = values.clone();
        let first = device
            .observe_property(&path, Property::Value, move |value| {
                seen.lock().unwrap().push(value.clone())
            })
            .unwrap();
        device.flush().await.unwrap();

        // first observer subscribes to the stream
        let elements = sent_elements(&handle);
        assert!(matches!(
            &elements[..],
            [GlowRootElement::QualifiedParameter(parameter)]
                if parameter.path == path
                    && matches!(
                        parameter.children.as_deref(),
                        Some([GlowElement::Command(command)])
                            if command.number == CommandType::Subscribe
                    )
        ));

        // a second observer shares it
        let second = device
            .observe_property(&path, Property::Value, |_| {})
            .unwrap();
        device.flush().await.unwrap();
        assert!(sent_elements(&handle).is_empty());

        // stream entries update the parameter unconditionally
        push_glow(
            &handle,
            GlowRoot::Streams(vec![GlowStreamEntry {
                stream_identifier: 7,
                value: Value::Integer(9),
            }]),
        );
        device.poll().await.unwrap();
        assert_eq!(
            *values.lock().unwrap(),
            vec![PropertyValue::Value(Value::Integer(9))]
        );

        // unknown identifiers are dropped silently
        push_glow(
            &handle,
            GlowRoot::Streams(vec![GlowStreamEntry {
                stream_identifier: 99,
                value: Value::Integer(1),
            }]),
        );
        device.poll().await.unwrap();
        assert_eq!(values.lock().unwrap().len(), 1);

        // only the last unsubscribe reaches the wire
        device.unsubscribe(first);
        device.flush().await.unwrap();
        assert!(sent_elements(&handle).is_empty());
        device.unsubscribe(second);
        device.flush().await.unwrap();
        assert_eq!(unsubscribe_commands(&sent_elements(&handle)), vec![path]);
    }

    #[tokio::test]
    async fn test_offline_node_loses_children() {
        let (mut device, handle) = new_device().await;

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(
                1,
                "audio",
                vec![parameter_element(
                    2,
                    GlowParameterContents::with_value(Value::Integer(1)),
                )],
            ))],
        );
        device.poll().await.unwrap();
        assert!(device.node(&PathKey::new(&[1, 2])).is_some());

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        device
            .observe_path(&PathKey::new(&[1, 2]), move |event| {
                seen.lock().unwrap().push(event.clone())
            })
            .unwrap();

        push_elements(
            &handle,
            vec![GlowRootElement::QualifiedNode(GlowQualifiedNode {
                path: PathKey::new(&[1]),
                contents: Some(GlowNodeContents {
                    is_online: Some(false),
                    ..Default::default()
                }),
                children: None,
            })],
        );
        device.poll().await.unwrap();

        assert!(device.node(&PathKey::new(&[1])).is_some());
        assert!(device.node(&PathKey::new(&[1, 2])).is_none());

        let events = events.lock().unwrap();
        // available on registration, removed when the parent went offline
        assert_eq!(events.len(), 2);
        assert!(!events[0].removed);
        assert!(events[1].removed);
    }

    #[tokio::test]
    async fn test_identifier_change_recreates_subtree() {
        let (mut device, handle) = new_device().await;

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(
                1,
                "audio",
                vec![parameter_element(
                    2,
                    GlowParameterContents::with_value(Value::Integer(1)),
                )],
            ))],
        );
        device.poll().await.unwrap();

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(1, "video", vec![]))],
        );
        device.poll().await.unwrap();

        let node = device
            .node(&PathKey::new(&[1]))
            .and_then(TreeEntry::as_node)
            .unwrap();
        assert_eq!(node.identifier(), Some("video"));
        assert!(device.node(&PathKey::new(&[1, 2])).is_none());
    }

    #[tokio::test]
    async fn test_identifier_paths() {
        let (mut device, handle) = new_device().await;

        push_elements(
            &handle,
            vec![GlowRootElement::Node(node_with_children(
                1,
                "audio",
                vec![parameter_element(
                    1,
                    GlowParameterContents {
                        identifier: Some("gain".to_string()),
                        ..Default::default()
                    },
                )],
            ))],
        );
        device.poll().await.unwrap();

        let path = PathKey::new(&[1, 1]);
        assert_eq!(device.identifier_path(&path), Some("audio/gain".to_string()));
        assert_eq!(
            device
                .node_by_identifier_path("audio/gain")
                .map(TreeEntry::path),
            Some(&path)
        );
        assert!(device.node_by_identifier_path("audio/mute").is_none());
    }

    #[tokio::test]
    async fn test_set_value_round_trip() {
        let (mut device, handle) = new_device().await;
        let path = PathKey::new(&[1]);

        push_elements(
            &handle,
            vec![GlowRootElement::Parameter(GlowParameter {
                number: 1,
                contents: Some(GlowParameterContents {
                    value: Some(Value::Integer(50)),
                    factor: Some(10),
                    ..Default::default()
                }),
                children: None,
            })],
        );
        device.poll().await.unwrap();
        handle.take_sent();

        device
            .set_effective_value(&path, &Value::Real(2.5))
            .unwrap();
        device.flush().await.unwrap();

        let elements = sent_elements(&handle);
        assert!(matches!(
            &elements[..],
            [GlowRootElement::QualifiedParameter(parameter)]
                if parameter.path == path
                    && parameter.contents.as_ref().and_then(|c| c.value.clone())
                        == Some(Value::Integer(25))
        ));

        // writes need a known parameter
        assert!(device
            .set_value(&PathKey::new(&[9]), Value::Integer(1))
            .is_err());
        assert!(device
            .set_value(&PathKey::root(), Value::Integer(1))
            .is_err());
    }
}
