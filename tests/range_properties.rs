// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod range_properties {
    //! # Range 性质测试
    //!
    //! 用随机文件与随机区间检查单区间响应的长度与内容，以及归一化的边界。

    use std::fs;

    use filehandler::{
        range::{prepare_range, serve_range, RangeSpec},
        Exception, HttpRequestMethod, Outcome, Request, Response,
    };
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// 合法的单区间：响应体长度为 last-first+1，且与源文件对应切片一致
        #[test]
        fn single_range_matches_slice(
            content in proptest::collection::vec(any::<u8>(), 1..2048),
            a in any::<prop::sample::Index>(),
            b in any::<prop::sample::Index>(),
        ) {
            let size = content.len();
            let (x, y) = (a.index(size), b.index(size));
            let (first, last) = (x.min(y), x.max(y));

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("blob.bin");
            fs::write(&path, &content).unwrap();

            let request = Request::new(HttpRequestMethod::Get, "/blob.bin")
                .with_header("Range", &format!("bytes={}-{}", first, last));
            let mut response = Response::new();
            let outcome = serve_range(&request, &mut response, &path, size as u64, "application/octet-stream");
            prop_assert_eq!(outcome, Ok(Outcome::PartialContent));

            let mut out = Vec::new();
            response.take_body().write_to(&mut out).unwrap();
            prop_assert_eq!(out.len(), last - first + 1);
            prop_assert_eq!(&out[..], &content[first..=last]);
        }

        /// 归一化后的区间总是落在 [0, size-1] 内且 first <= last
        #[test]
        fn prepared_range_is_within_bounds(
            size in 1u64..100_000,
            first in -200_000i64..200_000,
            last in -1i64..200_000,
        ) {
            if let Some((f, l)) = prepare_range(&RangeSpec { first, last }, size) {
                prop_assert!(f <= l);
                prop_assert!(l < size);
            }
        }

        /// 起点越过文件末尾的区间，无论单区间还是多区间都返回 416
        #[test]
        fn ranges_past_end_not_satisfiable(
            size in 1usize..512,
            offsets in proptest::collection::vec(0usize..1000, 1..4),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("blob.bin");
            fs::write(&path, vec![b'x'; size]).unwrap();

            let specs: Vec<String> = offsets.iter().map(|o| format!("{}-", size + o)).collect();
            let request = Request::new(HttpRequestMethod::Get, "/blob.bin")
                .with_header("Range", &format!("bytes={}", specs.join(",")));
            let mut response = Response::new();
            prop_assert_eq!(
                serve_range(&request, &mut response, &path, size as u64, "text/plain"),
                Err(Exception::RangeNotSatisfiable(size as u64))
            );
        }
    }
}
