use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::row::ExportRow;

/// 列の区切り文字。値の中に現れてもエスケープしない
pub const DELIMITER: &str = ";";

/// 出力行の書き出し先
pub trait RowSink {
    fn write_header(&mut self, columns: &[String]) -> Result<()>;

    fn write_row(&mut self, row: &ExportRow) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// 1行1 Issue、`;` 区切りで書き出す
pub struct DelimitedWriter<W: Write> {
    writer: W,
}

impl<W: Write> DelimitedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, values: &[String]) -> Result<()> {
        writeln!(self.writer, "{}", values.join(DELIMITER))?;
        Ok(())
    }
}

impl DelimitedWriter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl DelimitedWriter<BufWriter<File>> {
    /// 親ディレクトリがなければ作成する
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> RowSink for DelimitedWriter<W> {
    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        self.write_line(columns)
    }

    fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        self.write_line(&row.values)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// 複数の出力先（コンソールとファイルなど）に同じ行を書く
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn RowSink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn RowSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RowSink for TeeSink {
    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.write_header(columns))
    }

    fn write_row(&mut self, row: &ExportRow) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.write_row(row))
    }

    fn finish(&mut self) -> Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.finish())
    }
}
