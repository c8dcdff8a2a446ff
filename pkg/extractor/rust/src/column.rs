// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

/// Where a requested tag lives in one data file.
///
/// `T` is a field index for delimited text and a column rank for
/// worksheets. A tag bound to `NotFound` reads as NaN for the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column<T> {
    Found(T),
    NotFound,
}

impl<T: Copy> Column<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Column::Found(id) => Some(id),
            Column::NotFound => None,
        }
    }
}

/// Resolves every tag to the first header entry with exactly its name.
pub fn resolve<'a, T, I>(tags: &[String], header: I) -> Vec<Column<T>>
where
    T: Copy + 'a,
    I: IntoIterator<Item = (&'a str, T)> + Clone,
{
    tags.iter()
        .map(|tag| {
            header
                .clone()
                .into_iter()
                .find(|(name, _)| *name == tag.as_str())
                .map_or(Column::NotFound, |(_, id)| Column::Found(id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_exact_and_first_match() {
        let header = [("Date", 0), ("T1", 2), ("t2", 3), ("T1", 4)];
        let tags = vec!["T1".to_string(), "T2".to_string(), "t2".to_string()];
        assert_eq!(
            resolve(&tags, header.iter().copied()),
            vec![Column::Found(2), Column::NotFound, Column::Found(3)]
        );
    }
}
