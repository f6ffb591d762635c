//! Declarative menu tree.

use crate::console::Console;
use crate::context::{Context, ContextKey};
use crate::error::ActionError;

/// How the navigator proceeds after an action has run.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Navigation {
    /// Continue into the node's children.
    #[default]
    Advance,
    /// Leave the current menu level.
    Back,
    /// Redraw the current menu level.
    Repeat,
}

/// One entry of the menu tree. `A` tags the leaf action to run; the tree
/// itself holds no behaviour.
#[derive(Debug, Clone)]
pub struct ActionNode<A> {
    pub name: &'static str,
    pub action: Option<A>,
    pub children: Vec<ActionNode<A>>,
    pub requires: Vec<ContextKey>,
    quit: bool,
}

impl<A> ActionNode<A> {
    pub fn branch(name: &'static str, children: Vec<ActionNode<A>>) -> Self {
        Self {
            name,
            action: None,
            children,
            requires: Vec::new(),
            quit: false,
        }
    }

    pub fn leaf(name: &'static str, action: A) -> Self {
        Self {
            name,
            action: Some(action),
            children: Vec::new(),
            requires: Vec::new(),
            quit: false,
        }
    }

    /// The distinguished entry that ends the whole session.
    pub fn quit() -> Self {
        Self {
            name: "Quit",
            action: None,
            children: Vec::new(),
            requires: Vec::new(),
            quit: true,
        }
    }

    pub fn with_children(mut self, children: Vec<ActionNode<A>>) -> Self {
        self.children = children;
        self
    }

    pub fn requires(mut self, keys: &[ContextKey]) -> Self {
        self.requires = keys.to_vec();
        self
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    /// Children whose required keys are all present, in declaration order.
    pub fn valid_children(&self, ctx: &Context) -> Vec<&ActionNode<A>> {
        self.children
            .iter()
            .filter(|child| ctx.has_all(&child.requires))
            .collect()
    }
}

/// Runs the leaf actions a tree refers to.
pub trait Executor<A> {
    fn execute<C: Console>(
        &mut self,
        action: &A,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContextKey::*;

    fn tree() -> ActionNode<u8> {
        ActionNode::branch(
            "root",
            vec![
                ActionNode::leaf("always", 1),
                ActionNode::leaf("needs user", 2).requires(&[UserId]),
                ActionNode::leaf("needs user and slot", 3).requires(&[UserId, SlotId]),
                ActionNode::leaf("needs device", 4).requires(&[DeviceId]),
                ActionNode::branch("also always", vec![]),
            ],
        )
    }

    fn names<A>(nodes: &[&ActionNode<A>]) -> Vec<&'static str> {
        nodes.iter().map(|n| n.name).collect()
    }

    #[test]
    fn test_empty_context_shows_ungated_children() {
        let root = tree();
        let ctx = Context::new();
        assert_eq!(names(&root.valid_children(&ctx)), vec!["always", "also always"]);
    }

    #[test]
    fn test_all_required_keys_must_be_present() {
        let root = tree();
        let mut ctx = Context::new();
        ctx.slot_id = Some(9);
        assert_eq!(names(&root.valid_children(&ctx)), vec!["always", "also always"]);

        ctx.user_id = Some(1);
        assert_eq!(
            names(&root.valid_children(&ctx)),
            vec!["always", "needs user", "needs user and slot", "also always"]
        );
    }

    #[test]
    fn test_leaf_without_children_has_none() {
        let leaf: ActionNode<u8> = ActionNode::leaf("x", 0);
        assert!(leaf.valid_children(&Context::new()).is_empty());
        assert!(ActionNode::<u8>::quit().is_quit());
    }
}
