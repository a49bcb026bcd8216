//! Streaming reader for the indentation-scoped content text format
//!
//! Content files hold one `Name = Value` property per line. Nesting is
//! expressed purely by leading tab counts; there are no block delimiters.
//! Line comments (`//`) and block comments (`/* */`) are skipped, and the
//! reserved property `IncludeFile` splices another file into the stream at
//! the exact point it appears, recursively and invisibly to the caller.
//!
//! The [`Reader`] hands out a flat sequence of property names and values;
//! callers detect the end of a nested block through [`Reader::next_property`]
//! returning `false` once per closed nesting level.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Callback used to surface loading progress to a frontend.
///
/// The string is a preformatted report line (nested include depth shows up
/// as leading tabs); the flag is `true` when the line announces a newly
/// opened file rather than progress inside the current one.
pub type ProgressCallback = Box<dyn FnMut(&str, bool)>;

/// Reserved property name that splices the named file into the stream.
pub const INCLUDE_FILE_PROPERTY: &str = "IncludeFile";

/// How often scanning progress is reported, in lines.
const REPORT_LINE_INTERVAL: u32 = 100;

/// Maps content package names to the small numeric IDs assigned to them by
/// whatever component owns the set of loaded packages.
pub trait PackageIdResolver {
    /// Resolves a package name to its numeric ID, if the package is known.
    fn resolve(&self, package_name: &str) -> Option<u32>;
}

/// Errors produced while reading content files.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A data file could not be opened or read into memory.
    #[error("failed to open data file '{path}': {source}")]
    Open {
        /// Path of the file that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Malformed grammar; fatal, reported with file and line context.
    #[error("{message} in {path} at line {line}")]
    Syntax {
        /// What was wrong with the input.
        message: String,
        /// File the error occurred in.
        path: String,
        /// One-based line number of the error.
        line: u32,
    },
}

/// One fully buffered physical character stream.
#[derive(Debug, Default)]
struct TextStream {
    data: Vec<u8>,
    pos: usize,
}

impl TextStream {
    fn open(path: &Path) -> io::Result<Self> {
        let data = fs::read(path)?;
        Ok(Self { data, pos: 0 })
    }

    fn from_string(text: &str) -> Self {
        Self {
            data: text.as_bytes().to_vec(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_second(&self) -> Option<u8> {
        self.data.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn retreat(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
        }
    }
}

/// One suspended entry on the include stack: the parent stream, where it came
/// from, and the scan state to restore when the included file runs out.
struct StreamFrame {
    stream: TextStream,
    file_path: String,
    line: u32,
    indent: i32,
}

/// Streaming tokenizer over one logical property stream, chained across
/// physically included files.
///
/// The reader is strictly single-use and single-threaded: it is consumed
/// during content load, before any concurrent subsystems come up.
pub struct Reader {
    /// The currently active physical stream.
    stream: TextStream,
    /// Directory that include paths are resolved against.
    base_dir: PathBuf,
    /// Path of the current file, relative to the content root.
    file_path: String,
    /// Just the file name of the current file, for report strings.
    file_name: String,
    /// One-based line number within the current file.
    current_line: u32,
    /// Suspended parent streams, innermost include last.
    stream_stack: Vec<StreamFrame>,
    /// Tab count of the last line that was scanned past.
    previous_indent: i32,
    /// Signed indent change recorded by the last scan that consumed a newline.
    indent_difference: i32,
    /// Block endings already consumed at the current dedent.
    object_endings: i32,
    /// Set once every stream on the stack has been exhausted.
    end_of_streams: bool,
    /// Leading tabs for report strings, one per include level.
    report_tabs: String,
    /// Name of the package the opened file belongs to.
    package_name: String,
    /// Numeric ID of that package, when a resolver knew it.
    package_id: Option<u32>,
    /// Whether presets read through this reader replace same-named ones.
    overwrite_existing: bool,
    /// Whether `IncludeFile` directives are discarded instead of followed.
    skip_includes: bool,
    progress: Option<ProgressCallback>,
}

impl Reader {
    /// Opens the file at `path`, resolved against the content root `root`.
    ///
    /// The first component of `path` names the content package the file
    /// belongs to. A missing file is a fatal [`ReaderError::Open`]; use
    /// [`Reader::open_optional`] for files that are allowed to be absent.
    pub fn open(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let root = root.as_ref();
        let path = path.as_ref();
        let full_path = root.join(path);
        let stream = TextStream::open(&full_path).map_err(|source| ReaderError::Open {
            path: full_path.display().to_string(),
            source,
        })?;
        Ok(Self::with_stream(stream, root, &path.to_string_lossy()))
    }

    /// Opens a file that is allowed to be missing.
    ///
    /// Returns `Ok(None)` when the file does not exist; any other failure is
    /// reported as an error just like [`Reader::open`].
    pub fn open_optional(
        root: impl AsRef<Path>,
        path: impl AsRef<Path>,
    ) -> Result<Option<Self>, ReaderError> {
        match Self::open(root, path) {
            Ok(reader) => Ok(Some(reader)),
            Err(ReaderError::Open { ref path, ref source })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                log::info!("optional data file '{}' not present", path);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Binds the reader to an in-memory stream. Include paths are resolved
    /// against the current directory.
    pub fn from_string(text: &str) -> Self {
        Self::with_stream(TextStream::from_string(text), Path::new("."), "<memory>")
    }

    fn with_stream(stream: TextStream, root: &Path, file_path: &str) -> Self {
        let package_name = Path::new(file_path)
            .components()
            .find_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .unwrap_or_default();
        Self {
            stream,
            base_dir: root.to_path_buf(),
            file_path: file_path.to_string(),
            file_name: file_name_of(file_path),
            current_line: 1,
            stream_stack: Vec::new(),
            previous_indent: 0,
            indent_difference: 0,
            object_endings: 0,
            end_of_streams: false,
            report_tabs: "\t".to_string(),
            package_name,
            package_id: None,
            overwrite_existing: false,
            skip_includes: false,
            progress: None,
        }
    }

    /// Attaches a progress callback and reports the file just opened.
    pub fn with_progress(mut self, mut callback: ProgressCallback) -> Self {
        callback(
            &format!("{}{} on line {}", self.report_tabs, self.file_name, self.current_line),
            true,
        );
        self.progress = Some(callback);
        self
    }

    /// Sets whether presets read through this reader overwrite same-named
    /// presets already registered with their package.
    pub fn with_overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    /// Sets whether `IncludeFile` directives are discarded instead of
    /// followed, so only the physically present properties are read.
    pub fn with_skip_includes(mut self, skip: bool) -> Self {
        self.skip_includes = skip;
        self
    }

    /// Resolves the numeric ID of the package this reader was opened on.
    pub fn resolve_package_id(&mut self, resolver: &dyn PackageIdResolver) {
        self.package_id = resolver.resolve(&self.package_name);
    }

    /// Path of the file currently being read, relative to the content root.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// One-based line number within the current file.
    pub fn line_number(&self) -> u32 {
        self.current_line
    }

    /// Name of the package the opened file belongs to.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Numeric ID of the package, when a resolver was consulted and knew it.
    pub fn package_id(&self) -> Option<u32> {
        self.package_id
    }

    /// Whether presets read through this reader replace same-named ones.
    pub fn overwrite_existing(&self) -> bool {
        self.overwrite_existing
    }

    /// Whether every stream, including all includes, has been exhausted.
    pub fn end_of_streams(&self) -> bool {
        self.end_of_streams
    }

    /// Builds a fatal grammar error carrying the current file and line.
    pub fn error(&self, message: impl Into<String>) -> ReaderError {
        ReaderError::Syntax {
            message: message.into(),
            path: self.file_path.clone(),
            line: self.current_line,
        }
    }

    /// Reports whether another property is available at the current nesting
    /// level.
    ///
    /// A dedent of `k` levels makes the next `k` calls return `false`, one
    /// per closed block, after which reading resumes normally. This is the
    /// sole signal callers use to stop reading an object's properties.
    pub fn next_property(&mut self) -> Result<bool, ReaderError> {
        if !self.discard_empty_space()? || self.end_of_streams {
            return Ok(false);
        }
        // Fewer tabs than the previous line mean the current object's
        // property block has ended, once per closed level.
        if self.object_endings < -self.indent_difference {
            self.object_endings += 1;
            return Ok(false);
        }
        self.object_endings = 0;
        Ok(true)
    }

    /// Reads a property name, consuming the trailing `=`.
    ///
    /// An empty return value means the stream ran out. `IncludeFile` is
    /// handled internally: the directive either splices the named file in
    /// and yields the first property name found inside it, or (with include
    /// skipping active, or when the file cannot be opened) is discarded and
    /// the next property name is returned instead.
    pub fn read_prop_name(&mut self) -> Result<String, ReaderError> {
        if !self.discard_empty_space()? {
            return Ok(String::new());
        }

        let mut bytes = Vec::new();
        loop {
            match self.stream.peek() {
                None => {
                    self.end_include_file()?;
                    break;
                }
                Some(b'=') => {
                    self.stream.advance();
                    break;
                }
                Some(b'\n' | b'\r' | b'\t') => {
                    return Err(self.error("property name wasn't followed by a value"));
                }
                Some(byte) => {
                    self.stream.advance();
                    bytes.push(byte);
                }
            }
        }
        let name = String::from_utf8_lossy(&bytes)
            .trim_matches(' ')
            .to_string();

        if name == INCLUDE_FILE_PROPERTY {
            if self.skip_includes {
                self.read_prop_value()?;
                self.discard_empty_space()?;
                return self.read_prop_name();
            }
            // Whether the include opened or not, the next name comes from
            // whatever stream is active afterwards.
            self.start_include_file()?;
            return self.read_prop_name();
        }
        Ok(name)
    }

    /// Reads a property value: the rest of the current line, past the first
    /// `=` if one is still present, trimmed of surrounding spaces.
    pub fn read_prop_value(&mut self) -> Result<String, ReaderError> {
        let line = self.read_line()?;
        let value = match line.find('=') {
            Some(pos) => &line[pos + 1..],
            None => line.as_str(),
        };
        Ok(value.trim_matches(' ').to_string())
    }

    /// Reads a property value and parses it, turning parse failures into
    /// fatal grammar errors with file and line context.
    pub fn read_parsed<T: std::str::FromStr>(&mut self) -> Result<T, ReaderError> {
        let value = self.read_prop_value()?;
        value
            .parse()
            .map_err(|_| self.error(format!("invalid property value '{value}'")))
    }

    /// Reads the rest of the current line, stopping before newlines, tabs
    /// and line comments.
    pub fn read_line(&mut self) -> Result<String, ReaderError> {
        self.discard_empty_space()?;

        let mut bytes = Vec::new();
        while let Some(byte) = self.stream.peek() {
            if byte == b'\n' || byte == b'\r' || byte == b'\t' {
                break;
            }
            if byte == b'/' && self.stream.peek_second() == Some(b'/') {
                break;
            }
            self.stream.advance();
            bytes.push(byte);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads up to `terminator`, optionally consuming the terminator itself.
    pub fn read_to(&mut self, terminator: char, discard_terminator: bool) -> Result<String, ReaderError> {
        let terminator = terminator as u8;
        let mut bytes = Vec::new();
        while let Some(byte) = self.stream.peek() {
            if byte == terminator {
                break;
            }
            self.stream.advance();
            bytes.push(byte);
        }
        if discard_terminator && self.stream.peek() == Some(terminator) {
            self.stream.advance();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Consumes whitespace, comments and newlines up to the next piece of
    /// data, maintaining the line counter and the indentation bookkeeping.
    ///
    /// Returns `false` once every stream, including all includes, has been
    /// exhausted. Calling it repeatedly without crossing a line boundary
    /// leaves the recorded indentation difference untouched.
    pub fn discard_empty_space(&mut self) -> Result<bool, ReaderError> {
        let mut indent = 0;
        let mut ate_line = false;

        loop {
            let Some(byte) = self.stream.peek() else {
                // End of this stream; resume the including file if any.
                return self.end_include_file();
            };
            match byte {
                b' ' => {
                    self.stream.advance();
                }
                b'\t' => {
                    indent += 1;
                    self.stream.advance();
                }
                b'\n' | b'\r' => {
                    // CRLF line ends must not count the line twice.
                    if byte == b'\n' {
                        self.current_line += 1;
                        if self.current_line % REPORT_LINE_INTERVAL == 0 {
                            let message = format!(
                                "{}{} reading line {}",
                                self.report_tabs, self.file_name, self.current_line
                            );
                            self.report(&message, false);
                        }
                    }
                    indent = 0;
                    ate_line = true;
                    self.stream.advance();
                }
                b'/' => {
                    self.stream.advance();
                    match self.stream.peek() {
                        Some(b'/') => {
                            // Line comment: discard to end of line.
                            while let Some(next) = self.stream.peek() {
                                if next == b'\n' || next == b'\r' {
                                    break;
                                }
                                self.stream.advance();
                            }
                        }
                        Some(b'*') => {
                            self.stream.advance();
                            // Block comment: find the matching "*/", still
                            // counting the lines inside it.
                            loop {
                                match self.stream.advance() {
                                    None => break,
                                    Some(b'*') if self.stream.peek() == Some(b'/') => {
                                        self.stream.advance();
                                        break;
                                    }
                                    Some(b'\n') => self.current_line += 1,
                                    Some(_) => {}
                                }
                            }
                        }
                        _ => {
                            // A lone slash is data, not a comment.
                            self.stream.retreat();
                            break;
                        }
                    }
                }
                _ => break,
            }
        }

        if ate_line {
            self.indent_difference = indent - self.previous_indent;
            self.previous_indent = indent;
        }
        Ok(true)
    }

    /// Pushes the current stream and opens the file named by the pending
    /// `IncludeFile` value.
    ///
    /// Failure to open the included file is not fatal: the directive is
    /// logged and discarded, and scanning resumes in the including file.
    fn start_include_file(&mut self) -> Result<bool, ReaderError> {
        let announce = format!(
            "{}{} on line {} includes:",
            self.report_tabs, self.file_name, self.current_line
        );
        self.report(&announce, false);

        let include_path = self.read_prop_value()?;
        let full_path = self.base_dir.join(&include_path);
        let stream = match TextStream::open(&full_path) {
            Ok(stream) => stream,
            Err(err) => {
                log::error!(
                    "failed to open included data file '{}' referenced from {} at line {}: {}",
                    include_path,
                    self.file_path,
                    self.current_line,
                    err
                );
                let message = format!("{}could not include {}", self.report_tabs, include_path);
                self.report(&message, false);
                self.discard_empty_space()?;
                return Ok(false);
            }
        };

        let parent = StreamFrame {
            stream: std::mem::replace(&mut self.stream, stream),
            file_path: std::mem::replace(&mut self.file_path, include_path),
            line: self.current_line,
            indent: self.previous_indent,
        };
        self.stream_stack.push(parent);

        // Line counting restarts at 1 and, locally in the included file,
        // all properties start at indent 0.
        self.current_line = 1;
        self.previous_indent = 0;
        self.file_name = file_name_of(&self.file_path);
        self.update_report_tabs();
        let opened = format!(
            "{}{} on line {}",
            self.report_tabs, self.file_name, self.current_line
        );
        self.report(&opened, true);

        self.discard_empty_space()?;
        Ok(true)
    }

    /// Resumes the including file once the current stream is exhausted, or
    /// marks the reader permanently exhausted when there is none.
    fn end_include_file(&mut self) -> Result<bool, ReaderError> {
        if self.end_of_streams {
            return Ok(false);
        }
        let done = format!("{}{} - done!", self.report_tabs, self.file_name);
        self.report(&done, false);

        let Some(parent) = self.stream_stack.pop() else {
            self.end_of_streams = true;
            return Ok(false);
        };
        self.stream = parent.stream;
        self.file_path = parent.file_path;
        self.current_line = parent.line;
        // Leaving a file is itself a dedent relative to the including
        // context, so the saved baseline is added rather than restored.
        self.previous_indent += parent.indent;
        self.file_name = file_name_of(&self.file_path);
        self.update_report_tabs();
        let resumed = format!(
            "{}{} on line {}",
            self.report_tabs, self.file_name, self.current_line
        );
        self.report(&resumed, true);

        self.discard_empty_space()?;
        Ok(true)
    }

    fn update_report_tabs(&mut self) {
        self.report_tabs = "\t".repeat(self.stream_stack.len() + 1);
    }

    fn report(&mut self, message: &str, new_file: bool) {
        if let Some(callback) = self.progress.as_mut() {
            callback(message, new_file);
        }
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
