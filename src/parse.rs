//! Parse driver: feeds tokens from a [`TokenSource`] to the engine and wraps
//! the result in a [`ParseOutcome`].

use crate::engine::codes;
use crate::error::Error;
use crate::forest::ParseTree;
use crate::grammar::Grammar;

/// Allocation hooks for parse-forest memory; see [`ParseOptions::allocator`].
pub use crate::engine::ParseAlloc as ParseAllocator;

/// One input token: a terminal code and the caller's attribute for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<A> {
    pub code: i32,
    pub attr: A,
}

impl Token<()> {
    pub fn new(code: i32) -> Self {
        Token { code, attr: () }
    }
}

impl<A> Token<A> {
    pub fn with_attr(code: i32, attr: A) -> Self {
        Token { code, attr }
    }
}

/// Tokens pulled one at a time. `None` or a negative code ends the input.
pub trait TokenSource<A> {
    fn next_token(&mut self) -> Option<Token<A>>;
}

impl<A, I> TokenSource<A> for I
where
    I: Iterator<Item = Token<A>>,
{
    fn next_token(&mut self) -> Option<Token<A>> {
        self.next()
    }
}

/// A syntax error as reported by the engine. Indices count tokens from zero;
/// an index equal to the token count is the end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxError {
    pub error_token: usize,
    /// First token absorbed by the recovery; `None` when recovery failed.
    pub start_ignored: Option<usize>,
    /// First token after the absorbed span; `None` when recovery failed.
    pub start_recovered: Option<usize>,
}

impl SyntaxError {
    pub fn recovered(&self) -> bool {
        self.start_ignored.is_some()
    }
}

type Reporter<'a, A> = dyn FnMut(&SyntaxError, Option<&A>, Option<&A>, Option<&A>) + 'a;

/// Per-parse options: a syntax-error reporter and a forest allocator.
pub struct ParseOptions<'a, A> {
    reporter: Option<Box<Reporter<'a, A>>>,
    allocator: Option<Box<dyn ParseAllocator>>,
}

impl<A> Default for ParseOptions<'_, A> {
    fn default() -> Self {
        ParseOptions { reporter: None, allocator: None }
    }
}

impl<'a, A> ParseOptions<'a, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at most once per parse, only with error recovery on, with the
    /// error record and the attributes of the erroneous, first ignored and
    /// first recovered tokens.
    pub fn on_syntax_error(
        mut self,
        reporter: impl FnMut(&SyntaxError, Option<&A>, Option<&A>, Option<&A>) + 'a,
    ) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Allocator for the forest of this parse. The resulting tree returns its
    /// memory to the same allocator when released.
    pub fn allocator(mut self, allocator: impl ParseAllocator + 'static) -> Self {
        self.allocator = Some(Box::new(allocator));
        self
    }
}

/// Result of a parse.
#[derive(Debug)]
pub struct ParseOutcome<A> {
    /// Engine status; `0` is success.
    pub status: i32,
    /// The forest on success, unless the start symbol translated to nil.
    pub tree: Option<ParseTree<A>>,
    /// Meaningful only on success; always false with one-parse on.
    pub ambiguous: bool,
    pub syntax_error: Option<SyntaxError>,
    /// Engine message for a failed parse.
    pub message: Option<String>,
}

/// A successful parse.
#[derive(Debug)]
pub struct Parsed<A> {
    pub tree: Option<ParseTree<A>>,
    pub ambiguous: bool,
    /// Present when the input was accepted after a recovery.
    pub syntax_error: Option<SyntaxError>,
}

impl<A> ParseOutcome<A> {
    pub fn is_ok(&self) -> bool {
        self.status == codes::OK
    }

    pub fn into_result(self) -> Result<Parsed<A>, Error> {
        if self.status == codes::OK {
            return Ok(Parsed {
                tree: self.tree,
                ambiguous: self.ambiguous,
                syntax_error: self.syntax_error,
            });
        }
        Err(Error::Parse {
            code: self.status,
            message: self.message.unwrap_or_default(),
            syntax_error: self.syntax_error,
        })
    }
}

impl Grammar {
    /// Parse a sequence of terminal codes with default options.
    pub fn parse<I>(&mut self, tokens: I) -> ParseOutcome<()>
    where
        I: IntoIterator<Item = i32>,
    {
        self.parse_with(tokens.into_iter().map(Token::new), ParseOptions::default())
    }

    /// Parse tokens pulled from `source`.
    pub fn parse_with<A, S>(&mut self, mut source: S, options: ParseOptions<'_, A>) -> ParseOutcome<A>
    where
        S: TokenSource<A>,
    {
        let ParseOptions { mut reporter, allocator } = options;
        let mut record = None;
        let mut read = || source.next_token().map(|t| (t.code, t.attr));
        let mut on_error = |error: i32,
                            error_attr: Option<&A>,
                            ignored: i32,
                            ignored_attr: Option<&A>,
                            recovered: i32,
                            recovered_attr: Option<&A>| {
            let found = SyntaxError {
                error_token: usize::try_from(error).unwrap_or(0),
                start_ignored: usize::try_from(ignored).ok(),
                start_recovered: usize::try_from(recovered).ok(),
            };
            if let Some(report) = reporter.as_mut() {
                report(&found, error_attr, ignored_attr, recovered_attr);
            }
            record = Some(found);
        };
        let raw = self.raw_mut().parse(&mut read, Some(&mut on_error), allocator);

        let ambiguous = raw.ambiguous;
        let tree = raw
            .forest
            .filter(|forest| forest.root().is_some())
            .map(|forest| ParseTree::new(forest, ambiguous));
        let message = (raw.status != codes::OK).then(|| self.last_error().1);
        tracing::debug!(status = raw.status, ambiguous, recovered = record.is_some(), "parse finished");
        ParseOutcome {
            status: raw.status,
            tree,
            ambiguous,
            syntax_error: record,
            message,
        }
    }
}
