//! Syntax transformers and their lifecycle stages

use std::fmt;
use std::rc::Rc;

use crate::engine::syntax::SyntaxTree;
use crate::error::TspipeResult;

/// Rewrites a syntax tree in place.
///
/// An `Err` aborts the emit of the file and propagates out of the compile
/// pass.
pub type Transformer = Rc<dyn Fn(&mut SyntaxTree) -> TspipeResult<()>>;

/// Transformers that run before and after the engine's own work at one stage
#[derive(Clone, Default)]
pub struct CustomTransformers {
    pub before: Vec<Transformer>,
    pub after: Vec<Transformer>,
}

impl CustomTransformers {
    /// A set holding a single `before` transformer
    pub fn before(transformer: Transformer) -> Self {
        Self {
            before: vec![transformer],
            after: Vec::new(),
        }
    }

    /// A set holding a single `after` transformer
    pub fn after(transformer: Transformer) -> Self {
        Self {
            before: Vec::new(),
            after: vec![transformer],
        }
    }

    /// Append another set, keeping registration order within each list
    pub fn extend(&mut self, other: CustomTransformers) {
        self.before.extend(other.before);
        self.after.extend(other.after);
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }
}

impl fmt::Debug for CustomTransformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTransformers")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

/// Transformers for all three lifecycle hooks.
///
/// Order of application during emit:
/// 1. `pre_emit.before`, `pre_emit.after` on the freshly parsed tree
/// 2. `emit.before`
/// 3. lowering of type-only declarations
/// 4. `emit.after`
/// 5. `post_emit.before`, `post_emit.after`, right before printing
#[derive(Clone, Default, Debug)]
pub struct TransformerSet {
    pub pre_emit: CustomTransformers,
    pub emit: CustomTransformers,
    pub post_emit: CustomTransformers,
}

impl TransformerSet {
    pub fn is_empty(&self) -> bool {
        self.pre_emit.is_empty() && self.emit.is_empty() && self.post_emit.is_empty()
    }
}

/// Run transformers in order, stopping at the first error.
pub fn apply_transformers(transformers: &[Transformer], tree: &mut SyntaxTree) -> TspipeResult<()> {
    for transformer in transformers {
        transformer(tree)?;
    }
    Ok(())
}
