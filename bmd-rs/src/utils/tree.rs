//! Bone hierarchy rendering

use console::Style;

use bmd_rig::RiggedModel;
use bmd_rig::animation::BoneHierarchyEvaluator;

/// Kind of a rendered bone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Model,
    Bone,
    Dummy,
}

impl NodeType {
    /// Get color style for node type
    pub fn style(self, no_color: bool) -> Style {
        if no_color {
            Style::new()
        } else {
            match self {
                Self::Model => Style::new().bold().cyan(),
                Self::Bone => Style::new().green(),
                Self::Dummy => Style::new().dim(),
            }
        }
    }
}

/// A node in the rendered hierarchy
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub node_type: NodeType,
    pub note: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a new tree node
    pub fn new(name: String, node_type: NodeType) -> Self {
        Self {
            name,
            node_type,
            note: None,
            children: Vec::new(),
        }
    }

    /// Attach a short annotation shown after the name
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Options for tree rendering
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    pub max_depth: Option<usize>,
    pub no_color: bool,
}

/// Build the bone tree of a model, using the evaluator's resolved parents
pub fn bone_tree(model: &RiggedModel, evaluator: &BoneHierarchyEvaluator) -> TreeNode {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); model.bone_count()];
    let mut roots = Vec::new();
    for i in 0..model.bone_count() {
        match evaluator.parent(i) {
            Some(parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }

    let mut root = TreeNode::new(model.name.clone(), NodeType::Model)
        .with_note(format!("{} bones", model.bone_count()));
    root.children = roots.into_iter().map(|r| bone_node(model, &children, r)).collect();
    root
}

fn bone_node(model: &RiggedModel, children: &[Vec<usize>], index: usize) -> TreeNode {
    let bone = &model.bones[index];
    let node_type = if bone.dummy { NodeType::Dummy } else { NodeType::Bone };
    let mut node = TreeNode::new(format!("[{index}] {}", bone.name), node_type);
    if bone.dummy {
        node = node.with_note("dummy");
    }
    node.children = children[index]
        .iter()
        .map(|&c| bone_node(model, children, c))
        .collect();
    node
}

/// Render a tree structure to string
pub fn render_tree(root: &TreeNode, options: &TreeOptions) -> String {
    let mut output = String::new();
    render_node(root, &mut output, "", true, 0, options);
    output
}

fn render_node(
    node: &TreeNode,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &TreeOptions,
) {
    if let Some(max_depth) = options.max_depth
        && depth > max_depth
    {
        return;
    }

    let style = node.node_type.style(options.no_color);
    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };

    output.push_str(&format!("{prefix}{connector}{}", style.apply_to(&node.name)));
    if let Some(note) = &node.note {
        output.push_str(&format!(" ({note})"));
    }
    output.push('\n');

    let new_prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}{}", prefix, if is_last { "    " } else { "│   " })
    };

    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == node.children.len() - 1;
        render_node(child, output, &new_prefix, is_last_child, depth + 1, options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmd_rig::animation::EvaluatorOptions;

    #[test]
    fn test_bone_tree_rendering() {
        let model = RiggedModel::builder("knight")
            .bone("root", None)
            .bone("spine", Some(0))
            .dummy_bone("helm_socket", Some(1))
            .bone("arm", Some(1))
            .build();
        let evaluator = BoneHierarchyEvaluator::new(&model, EvaluatorOptions::default());

        let options = TreeOptions {
            max_depth: None,
            no_color: true,
        };
        let output = render_tree(&bone_tree(&model, &evaluator), &options);

        assert_eq!(
            output,
            "knight (4 bones)\n\
             └── [0] root\n    \
                 └── [1] spine\n        \
                     ├── [2] helm_socket (dummy)\n        \
                     └── [3] arm\n"
        );
    }

    #[test]
    fn test_max_depth() {
        let model = RiggedModel::builder("chain")
            .bone("a", None)
            .bone("b", Some(0))
            .bone("c", Some(1))
            .build();
        let evaluator = BoneHierarchyEvaluator::new(&model, EvaluatorOptions::default());

        let options = TreeOptions {
            max_depth: Some(2),
            no_color: true,
        };
        let output = render_tree(&bone_tree(&model, &evaluator), &options);
        assert!(output.contains("[1] b"));
        assert!(!output.contains("[2] c"));
    }
}
