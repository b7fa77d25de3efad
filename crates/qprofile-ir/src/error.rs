//! Error types for the IR crate.

use crate::value::{BlockId, ValueId};
use thiserror::Error;

/// Errors reported by structural verification.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum IrError {
    /// Two functions share a name.
    #[error("Function '{0}' is defined more than once")]
    DuplicateFunction(String),

    /// Two blocks in one function share an id.
    #[error("Block {block} appears more than once in '{function}'")]
    DuplicateBlock {
        /// Function name.
        function: String,
        /// The duplicated block.
        block: BlockId,
    },

    /// A block has no terminator.
    #[error("Block {block} in '{function}' has no terminator")]
    MissingTerminator {
        /// Function name.
        function: String,
        /// The unterminated block.
        block: BlockId,
    },

    /// A branch or phi references a block that does not exist.
    #[error("Unknown block {block} referenced in '{function}'")]
    UnknownBlock {
        /// Function name.
        function: String,
        /// The missing block.
        block: BlockId,
    },

    /// A value is defined more than once.
    #[error("Value {0} is defined more than once")]
    DuplicateDefinition(ValueId),

    /// A value is used but never defined in the function.
    #[error("Value {value} used in '{function}' is not defined there")]
    UndefinedValue {
        /// Function name.
        function: String,
        /// The undefined value.
        value: ValueId,
    },

    /// A phi appears after a non-phi instruction.
    #[error("Phi defining {value} in '{function}' is not at the start of its block")]
    MisplacedPhi {
        /// Function name.
        function: String,
        /// Value defined by the phi.
        value: ValueId,
    },

    /// A phi lists an incoming block that is not a predecessor.
    #[error("Phi defining {value} in '{function}' lists {block}, which is not a predecessor")]
    PhiPredecessor {
        /// Function name.
        function: String,
        /// Value defined by the phi.
        value: ValueId,
        /// The offending block.
        block: BlockId,
    },

    /// Result presence does not match the instruction type.
    #[error("Instruction '{instruction}' in '{function}' has inconsistent result type")]
    ResultTypeMismatch {
        /// Function name.
        function: String,
        /// Instruction mnemonic.
        instruction: String,
    },

    /// A call passes the wrong number of arguments to a known function.
    #[error("Call to '{callee}' passes {got} arguments, expected {expected}")]
    ArityMismatch {
        /// The callee.
        callee: String,
        /// Declared parameter count.
        expected: usize,
        /// Actual argument count.
        got: usize,
    },
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
