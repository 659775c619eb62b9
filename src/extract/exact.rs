use super::{Extraction, QueryTerm, TermExtractor};
use crate::analysis::fold_case;
use crate::config::PresearchConfig;
use crate::error::Result;
use crate::query::QueryClause;

/// Indexes term clauses under their own text.
#[derive(Debug, Clone, Default)]
pub struct ExactTermExtractor {
    fold_case: bool,
}

impl ExactTermExtractor {
    pub fn new(fold_case: bool) -> Self {
        Self { fold_case }
    }

    pub fn from_config(config: &PresearchConfig) -> Self {
        Self::new(config.fold_case)
    }
}

impl TermExtractor for ExactTermExtractor {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn extract(&self, clause: &QueryClause) -> Result<Option<Extraction>> {
        let QueryClause::Term { field, text } = clause else {
            return Ok(None);
        };

        let term = if self.fold_case {
            QueryTerm::exact(field, &fold_case(text))
        } else {
            QueryTerm::exact(field, text)
        };

        Ok(Some(Extraction::Terms(vec![term])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_clause() {
        let extractor = ExactTermExtractor::default();
        let extraction = extractor.extract(&QueryClause::term("body", "Foo")).unwrap();
        assert_eq!(
            extraction,
            Some(Extraction::Terms(vec![QueryTerm::exact("body", "Foo")]))
        );
    }

    #[test]
    fn test_fold_case() {
        let extractor = ExactTermExtractor::new(true);
        let extraction = extractor.extract(&QueryClause::term("body", "Foo")).unwrap();
        assert_eq!(
            extraction,
            Some(Extraction::Terms(vec![QueryTerm::exact("body", "foo")]))
        );

        let extraction = extractor.extract(&QueryClause::term("body", "ΘΕΟΣ")).unwrap();
        assert_eq!(
            extraction,
            Some(Extraction::Terms(vec![QueryTerm::exact("body", "θεοσ")]))
        );
    }

    #[test]
    fn test_other_clauses_ignored() {
        let extractor = ExactTermExtractor::default();
        assert_eq!(extractor.extract(&QueryClause::wildcard("body", "f*")).unwrap(), None);
        assert_eq!(
            extractor.extract(&QueryClause::All { clauses: vec![] }).unwrap(),
            None
        );
    }
}
