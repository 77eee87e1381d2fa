use sd_expr::ExprError;

/// Alias for `Result<T, DeckError>`.
pub type DeckResult<T> = Result<T, DeckError>;

/// Errors raised while loading or operating a deck.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// A leaf storylet description has no `id` field.
    #[error("storylet has no \"id\" property")]
    MissingId,

    /// Two storylets in one deck share an id.
    #[error("duplicate storylet id: \"{0}\"")]
    DuplicateId(String),

    /// `play` was asked for an id the deck doesn't hold.
    #[error("no storylet with id \"{0}\"")]
    UnknownStorylet(String),

    /// `redraw` was not "always", "never", or a non-negative integer.
    #[error("invalid redraw value: {0}")]
    InvalidRedraw(String),

    /// `priority` was not an integer or an expression string.
    #[error("invalid priority value: {0}")]
    InvalidPriority(String),

    /// The description document failed to parse or deserialize.
    #[error("invalid document: {0}")]
    Document(String),

    /// A packet or storylet item has the wrong shape.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// The named operation is forbidden while an async reshuffle is
    /// pending.
    #[error("async reshuffle in progress, can't call {0}()")]
    ReshuffleInProgress(&'static str),

    /// An expression failed to compile or evaluate.
    #[error(transparent)]
    Expr(#[from] ExprError),
}
