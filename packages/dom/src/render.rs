//! Builds the DOM for a flow content and registers what the mapper needs.
//!
//! Layout: the root editing host holds one `<p>` per paragraph. Every flow
//! node renders as one mapped element; text runs carry a literal text node,
//! paragraph breaks close the current `<p>`. Boxes, buttons and table cells
//! are nested editing hosts with their own [`FlowAxis`].

use crate::axis::FlowAxis;
use crate::errors::DomError;
use crate::registry::{FlowRegistry, OwnerToken};
use crate::tree::{DomNodeId, DomTree};
use scribing_flow::{FlowContent, FlowNode, FlowTable};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistrationKind {
    Node,
    Host,
    Axis,
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    node: DomNodeId,
    token: OwnerToken,
    kind: RegistrationKind,
}

/// A mounted flow: its root editing host and the registrations it owns
#[derive(Debug)]
pub struct RenderedFlow {
    root: DomNodeId,
    registrations: Vec<Registration>,
}

impl RenderedFlow {
    pub fn root(&self) -> DomNodeId {
        self.root
    }
}

struct Renderer<'a> {
    tree: &'a mut DomTree,
    registry: &'a mut FlowRegistry,
    registrations: Vec<Registration>,
}

impl Renderer<'_> {
    fn record(&mut self, node: DomNodeId, token: OwnerToken, kind: RegistrationKind) {
        self.registrations.push(Registration { node, token, kind });
    }

    fn host(&mut self, element: DomNodeId, content: &FlowContent) -> Result<(), DomError> {
        let token = self.registry.register_host(element, content.clone());
        self.record(element, token, RegistrationKind::Host);

        let mut paragraph: Option<DomNodeId> = None;
        for (position, node) in content.node_positions() {
            let block = match paragraph {
                Some(block) => block,
                None => {
                    let block = self.tree.create_element("p");
                    self.tree.append_child(element, block)?;
                    paragraph = Some(block);
                    block
                }
            };
            self.node(block, position, node)?;
            if node.is_paragraph_break() {
                paragraph = None;
            }
        }
        if content.is_empty() {
            let block = self.tree.create_element("p");
            self.tree.append_child(element, block)?;
        }
        Ok(())
    }

    fn nested(&mut self, element: DomNodeId, axis: FlowAxis, content: &FlowContent) -> Result<(), DomError> {
        let token = self.registry.register_axis(element, axis);
        self.record(element, token, RegistrationKind::Axis);
        self.host(element, content)
    }

    fn node(&mut self, parent: DomNodeId, position: usize, node: &FlowNode) -> Result<(), DomError> {
        let element = self.tree.create_element(tag_of(node));
        self.tree.append_child(parent, element)?;
        let token = self.registry.register_node(element, node.clone());
        self.record(element, token, RegistrationKind::Node);

        match node {
            FlowNode::Text(run) => {
                let text = self.tree.create_text(run.text.as_str());
                self.tree.append_child(element, text)?;
            }
            FlowNode::Box(flow_box) => {
                self.nested(element, FlowAxis::Box { position }, &flow_box.content)?;
            }
            FlowNode::Button(button) => {
                self.nested(element, FlowAxis::Button { position }, &button.content)?;
            }
            FlowNode::Table(table) => self.table(element, position, table)?,
            _ => {}
        }
        Ok(())
    }

    fn table(&mut self, element: DomNodeId, position: usize, table: &FlowTable) -> Result<(), DomError> {
        for row in 0..table.rows() {
            let tr = self.tree.create_element("tr");
            self.tree.append_child(element, tr)?;
            for (cell, data) in table.cells().iter().filter(|(cell, _)| cell.row == row) {
                let td = self.tree.create_element("td");
                self.tree.append_child(tr, td)?;
                self.nested(td, FlowAxis::TableCell { position, cell: *cell }, &data.content)?;
            }
        }
        Ok(())
    }
}

fn tag_of(node: &FlowNode) -> &'static str {
    match node {
        FlowNode::Text(_)
        | FlowNode::ParagraphBreak { .. }
        | FlowNode::StartMarkup { .. }
        | FlowNode::EndMarkup { .. }
        | FlowNode::EmptyMarkup { .. }
        | FlowNode::Dynamic(_) => "span",
        FlowNode::LineBreak { .. } => "br",
        FlowNode::Box(_) => "div",
        FlowNode::Button(_) => "button",
        FlowNode::Table(_) => "table",
        FlowNode::Image(_) => "img",
        FlowNode::Video(_) => "video",
        FlowNode::Icon(_) => "svg",
    }
}

/// Render `content` under a new root editing host
pub fn render_content(
    tree: &mut DomTree,
    registry: &mut FlowRegistry,
    content: &FlowContent,
) -> Result<RenderedFlow, DomError> {
    let root = tree.create_element("div");
    let mut renderer = Renderer {
        tree,
        registry,
        registrations: Vec::new(),
    };
    renderer.host(root, content)?;
    debug!(
        root = %root,
        registrations = renderer.registrations.len(),
        "Rendered flow content"
    );
    Ok(RenderedFlow {
        root,
        registrations: renderer.registrations,
    })
}

/// Release the registrations of `rendered` and remove its DOM. Entries
/// re-registered by a newer mount are left alone.
pub fn unmount(
    tree: &mut DomTree,
    registry: &mut FlowRegistry,
    rendered: RenderedFlow,
) -> Result<(), DomError> {
    for registration in rendered.registrations.iter().rev() {
        let Registration { node, token, kind } = *registration;
        match kind {
            RegistrationKind::Node => registry.release_node(node, token),
            RegistrationKind::Host => registry.release_host(node, token),
            RegistrationKind::Axis => registry.release_axis(node, token),
        };
    }
    tree.remove(rendered.root)
}
