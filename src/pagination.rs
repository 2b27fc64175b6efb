use async_trait::async_trait;
use std::collections::VecDeque;

use crate::config_store::{ExportConfig, ProjectionPolicy};
use crate::error::{Error, Result};
use crate::field_rule::FieldRuleSet;
use crate::models::RawIssue;
use crate::row::{ExportRow, build_row, header_row};
use crate::sink::RowSink;

/// 1ページ分の検索要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub jql: String,
    pub start_at: u32,
    pub max_results: u32,
    pub fields: Vec<String>,
}

/// 1ページ分の検索結果
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// サーバーが報告する総件数
    pub total: u32,
    pub issues: Vec<RawIssue>,
}

/// 検索を実行する外部サービスの抽象化
#[async_trait]
pub trait IssueSource: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;
}

/// ページング位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub start_at: u32,
    pub page_size: u32,
    pub total: u32,
}

impl PaginationCursor {
    /// 初回の取得を必ず行うため、total は page_size で初期化する
    pub fn new(page_size: u32) -> Self {
        Self {
            start_at: 0,
            page_size,
            total: page_size,
        }
    }

    pub fn has_more(&self) -> bool {
        self.start_at < self.total
    }

    /// 返ってきた件数に関係なく page_size だけ進める
    pub fn advance(&mut self, reported_total: u32) {
        self.total = reported_total;
        self.start_at = self.start_at.saturating_add(self.page_size);
    }
}

enum State {
    Fetching,
    Emitting(VecDeque<RawIssue>),
    Done,
}

/// 検索結果を1行ずつ返す遅延シーケンス
///
/// 途中からの再開はできない。エラーの後は `None` を返し続ける。
pub struct Paginator<'a, S: IssueSource + ?Sized> {
    source: &'a S,
    jql: &'a str,
    rules: &'a FieldRuleSet,
    fields: Vec<String>,
    cursor: PaginationCursor,
    state: State,
    fetch_count: usize,
}

impl<'a, S: IssueSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, jql: &'a str, rules: &'a FieldRuleSet, page_size: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidConfiguration(
                "page size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            source,
            jql,
            rules,
            fields: rules.internal_names(),
            cursor: PaginationCursor::new(page_size),
            state: State::Fetching,
            fetch_count: 0,
        })
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }

    pub async fn next_row(&mut self) -> Result<Option<ExportRow>> {
        loop {
            match &mut self.state {
                State::Done => return Ok(None),
                State::Emitting(buffer) => match buffer.pop_front() {
                    Some(issue) => return Ok(Some(build_row(&issue, self.rules))),
                    None => self.state = State::Fetching,
                },
                State::Fetching => {
                    if !self.cursor.has_more() {
                        self.state = State::Done;
                        continue;
                    }
                    match self.fetch_page().await {
                        Ok(issues) => self.state = State::Emitting(issues.into()),
                        Err(e) => {
                            self.state = State::Done;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn fetch_page(&mut self) -> Result<Vec<RawIssue>> {
        let request = SearchRequest {
            jql: self.jql.to_string(),
            start_at: self.cursor.start_at,
            max_results: self.cursor.page_size,
            fields: self.fields.clone(),
        };

        let page = self.source.search(&request).await?;
        self.fetch_count += 1;

        tracing::debug!(
            start_at = request.start_at,
            total = page.total,
            returned = page.issues.len(),
            "fetched page"
        );

        self.cursor.advance(page.total);
        Ok(page.issues)
    }
}

/// エクスポート結果の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub pages: usize,
    /// 空文字列に置き換えたフィールドの数
    pub warnings: usize,
    /// 最後のページでサーバーが報告した総件数
    pub total: u32,
}

/// 検索結果をすべて取得してシンクへ書き出す
pub async fn export<S, K>(source: &S, config: &ExportConfig, sink: &mut K) -> Result<ExportSummary>
where
    S: IssueSource + ?Sized,
    K: RowSink + ?Sized,
{
    let options = &config.options;
    let mut paginator = Paginator::new(source, &config.jql, &config.rules, options.page_size)?;
    let mut summary = ExportSummary::default();

    tracing::info!(jql = %config.jql, fields = config.rules.len(), page_size = options.page_size, "starting export");

    if options.header {
        sink.write_header(&header_row(&config.rules))?;
    }

    while let Some(row) = paginator.next_row().await? {
        if options.policy == ProjectionPolicy::Strict {
            if let Some(warning) = row.warnings.first() {
                return Err(Error::Projection {
                    issue: row.key().to_string(),
                    field: warning.field.clone(),
                    source: warning.error.clone(),
                });
            }
        }

        summary.warnings += row.warnings.len();
        summary.rows += 1;
        sink.write_row(&row)?;
    }

    sink.finish()?;

    summary.pages = paginator.fetch_count();
    summary.total = paginator.cursor().total;

    tracing::info!(
        rows = summary.rows,
        pages = summary.pages,
        warnings = summary.warnings,
        "export finished"
    );

    Ok(summary)
}
