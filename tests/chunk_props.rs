use formtable::{AcceptAll, ParamKind, ParameterTable, RequestConfig, RequestContext, Utf8Check};
use proptest::prelude::*;

/// Split `data` into consecutive chunks at the given cut points.
fn split_at_cuts(data: &[u8], cuts: &[usize]) -> Vec<(usize, Vec<u8>)> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
    points.push(0);
    points.push(data.len());
    points.sort_unstable();
    points.dedup();

    points
        .windows(2)
        .map(|w| (w[0], data[w[0]..w[1]].to_vec()))
        .collect()
}

proptest! {
    #[test]
    fn covering_chunks_reassemble(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut table = ParameterTable::new();
        for (offset, chunk) in split_at_cuts(&data, &cuts) {
            table.append_chunk("f", &chunk, offset).unwrap();
        }

        prop_assert_eq!(table.value("f"), Some(data.as_slice()));
        prop_assert_eq!(table.value_size("f"), Some(data.len()));

        let ParamKind::Scalar(buf) = table.get("f").unwrap().kind() else {
            panic!("expected scalar");
        };
        prop_assert_eq!(buf.padded()[data.len()], 0);
    }

    #[test]
    fn original_value_matches_pre_validation_input(
        value in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut ctx = RequestContext::new(RequestConfig::default());
        ctx.add("f", &value).unwrap();
        prop_assert_eq!(ctx.table().original_value("f"), Some(None));

        ctx.validate(&AcceptAll, &Utf8Check).unwrap();
        let original = ctx.table().original_value("f").unwrap();
        if std::str::from_utf8(&value).is_ok() {
            prop_assert_eq!(original, None);
        } else {
            prop_assert_eq!(original, Some(value.as_slice()));
        }
    }
}
