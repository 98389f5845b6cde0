//! Bottom-up summarization of the attached subtree.

use crate::error::Result;
use crate::session::Session;
use crate::tree::{NodeId, SyntaxTree};

/// Summarize `id` and every attached descendant, post-order.
///
/// A node with a summary is returned as is. A leaf gets one generation
/// request for its own text; a node with children gets that request plus one
/// joint request combining it with each child summary in attachment order.
pub fn summarize(tree: &mut SyntaxTree, id: NodeId, session: &Session) -> Result<String> {
    let cached = tree.node(id).summary();
    if !cached.is_empty() {
        return Ok(cached.to_string());
    }

    let prompts = session.prompts();
    let individual = session.summarize_prompt(format!("{}{}", prompts.individual_header, tree.core_text(id)))?;
    tracing::debug!(node = %tree.node(id).describe(), "individual summary done");

    let children: Vec<NodeId> = tree.node(id).children().values().copied().collect();
    let summary = if children.is_empty() {
        individual
    } else {
        let mut prompt = format!("{}{}", prompts.joint_header, individual);
        for child in children {
            let child_summary = summarize(tree, child, session)?;
            prompt.push_str(&prompts.child_header_for(tree.node(child).kind_label()));
            prompt.push_str(&child_summary);
        }
        session.summarize_prompt(prompt)?
    };

    tree.set_summary(id, summary);
    Ok(tree.node(id).summary().to_string())
}
