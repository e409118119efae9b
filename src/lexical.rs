//! Lexical scoring provider backed by a Tantivy BM25 index.
//!
//! The index is built in RAM from the chunk set on every call, which
//! keeps the provider stateless and the scores a pure function of
//! (query, chunks).

use tantivy::{
    Index,
    TantivyDocument,
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    config::Bm25Config,
    corpus::Chunk,
    error::Result,
    provider::{ProviderScore, ScoringProvider},
};

/// Field names used in the schema.
mod fields {
    pub const CHUNK_ID: &str = "chunk_id";
    pub const BODY: &str = "body";
}

#[derive(Clone, Copy)]
struct SchemaFields {
    chunk_id: Field,
    body: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let chunk_id = builder.add_text_field(fields::CHUNK_ID, STRING | STORED);

    let body_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let body = builder.add_text_field(fields::BODY, body_opts);

    let schema = builder.build();
    (schema, SchemaFields { chunk_id, body })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

/// BM25 lexical provider.
pub struct LexicalProvider {
    fuzzy: bool,
    limit: usize,
}

impl LexicalProvider {
    pub fn new(config: &Bm25Config, limit: usize) -> Self {
        Self {
            fuzzy: config.fuzzy,
            limit,
        }
    }

    fn build_index(chunks: &[Chunk]) -> Result<(Index, SchemaFields)> {
        let (schema, f) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index);

        // A single writer thread keeps segment layout, and with it the
        // per-segment BM25 statistics, identical across runs.
        let mut writer = index.writer_with_num_threads(1, 50_000_000)?;
        for chunk in chunks {
            writer.add_document(doc!(
                f.chunk_id => chunk.chunk_id.as_str(),
                f.body => chunk.text.as_str(),
            ))?;
        }
        writer.commit()?;

        Ok((index, f))
    }

    fn build_query(
        &self,
        index: &Index,
        f: SchemaFields,
        query_str: &str,
    ) -> Box<dyn tantivy::query::Query> {
        let parser = QueryParser::for_index(index, vec![f.body]);
        let (parsed, _errors) = parser.parse_query_lenient(query_str);

        if !self.fuzzy {
            return parsed;
        }

        // OR Levenshtein-distance-1 clauses in next to the parsed query
        // for every significant term.
        let mut should_clauses: Vec<(
            tantivy::query::Occur,
            Box<dyn tantivy::query::Query>,
        )> = vec![(tantivy::query::Occur::Should, parsed)];

        for term_str in query_str.split_whitespace() {
            if term_str.len() >= 3 {
                let term = tantivy::Term::from_field_text(
                    f.body,
                    &term_str.to_lowercase(),
                );
                let fuzzy = tantivy::query::FuzzyTermQuery::new(term, 1, true);
                should_clauses
                    .push((tantivy::query::Occur::Should, Box::new(fuzzy)));
            }
        }

        Box::new(tantivy::query::BooleanQuery::new(should_clauses))
    }
}

impl ScoringProvider for LexicalProvider {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn score(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<ProviderScore>> {
        if chunks.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let (index, f) = Self::build_index(chunks)?;
        let reader = index.reader()?;
        reader.reload()?;
        let searcher = reader.searcher();

        let final_query = self.build_query(&index, f, query);
        let top_docs = searcher
            .search(&*final_query, &TopDocs::with_limit(self.limit.max(1)))?;

        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let chunk_id = extract_text(&doc, f.chunk_id);
            if seen.insert(chunk_id.clone()) {
                results.push(ProviderScore { chunk_id, score });
            }
        }

        Ok(results)
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
