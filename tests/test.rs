#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tinytok::artifact;
    use tinytok::filters::{
        Caps, CapsDecode, FilterChain, Reserved, Words, WordsDecode, CHR_ALL_CAPS,
        CHR_CAPITALIZE, CHR_END_OF_WORD, CHR_UNKNOWN,
    };
    use tinytok::mining;
    use tinytok::optimizer;
    use tinytok::source::{ChunkProvider, TextFile};
    use tinytok::stats::StatsSummary;
    use tinytok::tokenizer::{ByteTokenizer, GreedyTokenizer, OptimalTokenizer};
    use tinytok::trainer::{train, OptimizerInfo, TrainOptions, Trained};
    use tinytok::vocabulary::{build_bits_token_set, build_hex_token_set, TokenRef, TokenSet};

    fn hex_set_with(tokens: &[&[u8]]) -> TokenSet {
        let mut token_set = build_hex_token_set();
        for string in tokens {
            token_set.add_string(string);
        }
        token_set
    }

    fn id_strings(token_set: &TokenSet, ids: &[u32]) -> Vec<Vec<u8>> {
        ids.iter()
            .map(|&id| token_set.token(id).string().to_vec())
            .collect()
    }

    fn check_tokenization(text: &[u8], tokens: &[&[u8]], expected: &[&[u8]], greedy: bool) {
        let mut token_set = hex_set_with(tokens);
        let strings = if greedy {
            let tokenizer = GreedyTokenizer::new(&token_set);
            let ids: Vec<u32> = tokenizer.tokenize(text).collect();
            id_strings(&token_set, &ids)
        } else {
            let tokenizer = OptimalTokenizer::new(&mut token_set);
            let ids: Vec<u32> = tokenizer.tokenize(text.iter().copied()).collect();
            id_strings(tokenizer.token_set(), &ids)
        };
        let expected: Vec<Vec<u8>> = expected.iter().map(|s| s.to_vec()).collect();
        assert_eq!(strings, expected, "tokenizing {:?}", text);
    }

    // Decodes expanded output ids back to bytes. Inputs in these tests avoid
    // raw fallback bytes (0x10-0x12), so every fallback token occurrence is
    // an expansion.
    fn decode(token_set: &TokenSet, ids: &[u32]) -> Vec<u8> {
        let digit_value = |id: u32| -> u8 {
            let c = token_set.token(id).string()[0];
            if c.is_ascii_digit() {
                c - b'0'
            } else {
                c - b'a' + 10
            }
        };
        let mut out = Vec::new();
        let mut i = 0;
        while i < ids.len() {
            let id = ids[i];
            if token_set.has_hex() && Some(id) == token_set.hex_marker() {
                out.push(digit_value(ids[i + 1]) * 16 + digit_value(ids[i + 2]));
                i += 3;
            } else if !token_set.has_hex()
                && (Some(id) == token_set.bit0() || Some(id) == token_set.bit1())
            {
                let mut byte = 0u8;
                for k in 0..8 {
                    byte = (byte << 1) | u8::from(Some(ids[i + k]) == token_set.bit1());
                }
                out.push(byte);
                i += 8;
            } else {
                out.extend_from_slice(token_set.token(id).string());
                i += 1;
            }
        }
        out
    }

    // Full-array reference dynamic program, independent of the sliding
    // window and the suffix chains.
    fn reference_cost(token_set: &TokenSet, input: &[u8]) -> u64 {
        let literal_cost = token_set.literal_cost();
        let mut dp = vec![u64::MAX; input.len() + 1];
        dp[0] = 0;
        for i in 1..=input.len() {
            let mut best = dp[i - 1] + literal_cost;
            for token in token_set.tokens() {
                let len = token.len();
                if len <= i && &input[i - len..i] == token.string() {
                    best = best.min(dp[i - len] + 1);
                }
            }
            dp[i] = best;
        }
        dp[input.len()]
    }

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn tokenize_opt1() {
        check_tokenization(b"ab", &[b"a", b"b", b"ab"], &[b"ab"], false);
    }

    #[test]
    fn tokenize_greedy1() {
        check_tokenization(b"ab", &[b"a", b"b", b"ab"], &[b"ab"], true);
    }

    #[test]
    fn tokenize_opt1x3() {
        check_tokenization(
            b"ab ab ab",
            &[b"a", b"b", b"ab"],
            &[b"ab", b"\x10", b"2", b"0", b"ab", b"\x10", b"2", b"0", b"ab"],
            false,
        );
    }

    #[test]
    fn tokenize_greedy1x3() {
        check_tokenization(
            b"ab ab ab",
            &[b"a", b"b", b"ab"],
            &[b"ab", b"\x10", b"2", b"0", b"ab", b"\x10", b"2", b"0", b"ab"],
            true,
        );
    }

    #[test]
    fn tokenize_opt2() {
        check_tokenization(b"xyz", &[b"x", b"xy", b"yz"], &[b"x", b"yz"], false);
    }

    #[test]
    fn tokenize_greedy2() {
        // Greedy commits to "xy" and pays three fallback tokens for 'z'.
        check_tokenization(b"xyz", &[b"x", b"xy", b"yz"], &[b"xy", b"\x10", b"7", b"a"], true);
    }

    #[test]
    fn tokenize_opt2x3() {
        check_tokenization(
            b"xyz xyz xyz",
            &[b"x", b"xy", b"yz"],
            &[
                b"x", b"yz", b"\x10", b"2", b"0", b"x", b"yz", b"\x10", b"2", b"0", b"x", b"yz",
            ],
            false,
        );
    }

    #[test]
    fn tokenize_greedy2x3() {
        check_tokenization(
            b"xyz xyz xyz",
            &[b"x", b"xy", b"yz"],
            &[
                b"xy", b"\x10", b"7", b"a", b"\x10", b"2", b"0", b"xy", b"\x10", b"7", b"a",
                b"\x10", b"2", b"0", b"xy", b"\x10", b"7", b"a",
            ],
            true,
        );
    }

    #[test]
    fn tokenize_opt3() {
        check_tokenization(
            b"xyztuv",
            &[b"xy", b"zt", b"uv", b"xyztu"],
            &[b"xy", b"zt", b"uv"],
            false,
        );
    }

    #[test]
    fn tokenize_opt4() {
        check_tokenization(
            b"xyztuv",
            &[b"x", b"y", b"z", b"t", b"u", b"xyztu"],
            &[b"xyztu", b"\x10", b"7", b"6"],
            false,
        );
    }

    #[test]
    fn tokenize_empty_input() {
        let mut token_set = hex_set_with(&[b"ab"]);
        let tokenizer = OptimalTokenizer::new(&mut token_set);
        assert_eq!(tokenizer.tokenize(std::iter::empty()).count(), 0);
    }

    #[test]
    fn tokenize_mandatory_only() {
        let mut token_set = build_hex_token_set();
        let tokenizer = OptimalTokenizer::new(&mut token_set);
        let ids: Vec<u32> = tokenizer.tokenize(b"ok".iter().copied()).collect();
        assert_eq!(ids.len(), 6, "two bytes, three hex tokens each");
        assert_eq!(decode(tokenizer.token_set(), &ids), b"ok");
    }

    #[test]
    fn tokenize_bits_fallback() {
        let mut token_set = build_bits_token_set();
        token_set.add_string(b"hello");
        let tokenizer = OptimalTokenizer::new(&mut token_set);
        let ids: Vec<u32> = tokenizer.tokenize(b"hello!".iter().copied()).collect();
        assert_eq!(ids.len(), 9, "one token plus eight bits");
        assert_eq!(decode(tokenizer.token_set(), &ids), b"hello!");
    }

    #[test]
    #[should_panic(expected = "fallback")]
    fn tokenizer_requires_fallback() {
        let mut token_set = TokenSet::new();
        token_set.add_string(b"ab");
        let _ = OptimalTokenizer::new(&mut token_set);
    }

    #[test]
    fn byte_tokenizer_reference() {
        let mut token_set = hex_set_with(&[b"k", b"ok"]);
        token_set.compute_suffix_tokens();
        let tokenizer = ByteTokenizer::new(&token_set);
        let ids: Vec<u32> = tokenizer.tokenize(b"ok!".iter().copied()).collect();
        // 'o' has no single-byte token, "ok" is never used, '!' falls back.
        assert_eq!(decode(&token_set, &ids), b"ok!");
        assert_eq!(ids.len(), 3 + 1 + 3);
    }

    #[test]
    fn optimal_legality_and_optimality_random() {
        let mut rng = StdRng::seed_from_u64(7);
        for case in 0..20 {
            // 'w'..'z' are not hex digits, so unmatched bytes become real
            // literal expansions.
            let len = rng.gen_range(20..200);
            let input: Vec<u8> = (0..len).map(|_| b"wxyz"[rng.gen_range(0..4)]).collect();
            let mut token_set = build_hex_token_set();
            for _ in 0..rng.gen_range(2..10) {
                let start = rng.gen_range(0..input.len());
                let max = (input.len() - start).min(6);
                let sub_len = rng.gen_range(1..=max);
                token_set.add_string(&input[start..start + sub_len]);
            }
            let tokenizer = OptimalTokenizer::new(&mut token_set);
            let ids: Vec<u32> = tokenizer.tokenize(input.iter().copied()).collect();

            assert_eq!(
                decode(tokenizer.token_set(), &ids),
                input,
                "case {} decodes to the input",
                case
            );
            assert_eq!(
                ids.len() as u64,
                reference_cost(tokenizer.token_set(), &input),
                "case {} matches the reference dynamic program",
                case
            );

            let greedy = GreedyTokenizer::new(tokenizer.token_set());
            let greedy_len = greedy.tokenize(&input).count();
            assert!(
                ids.len() <= greedy_len,
                "case {}: optimal {} must not exceed greedy {}",
                case,
                ids.len(),
                greedy_len
            );
        }
    }

    #[test]
    fn optimal_legality_bits_random() {
        let mut rng = StdRng::seed_from_u64(11);
        for case in 0..10 {
            let len = rng.gen_range(20..120);
            let input: Vec<u8> = (0..len).map(|_| rng.gen_range(b' '..b'~')).collect();
            let mut token_set = build_bits_token_set();
            for _ in 0..rng.gen_range(2..8) {
                let start = rng.gen_range(0..input.len());
                let max = (input.len() - start).min(5);
                let sub_len = rng.gen_range(1..=max);
                token_set.add_string(&input[start..start + sub_len]);
            }
            let tokenizer = OptimalTokenizer::new(&mut token_set);
            let ids: Vec<u32> = tokenizer.tokenize(input.iter().copied()).collect();
            assert_eq!(decode(tokenizer.token_set(), &ids), input, "case {}", case);
            assert_eq!(
                ids.len() as u64,
                reference_cost(tokenizer.token_set(), &input),
                "case {}",
                case
            );
        }
    }

    #[test]
    fn adding_a_token_never_hurts() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..10 {
            let len = rng.gen_range(30..150);
            let input: Vec<u8> = (0..len).map(|_| b"abc"[rng.gen_range(0..3)]).collect();
            let mut token_set = hex_set_with(&[b"ab", b"ca"]);
            let before = {
                let tokenizer = OptimalTokenizer::new(&mut token_set);
                tokenizer.tokenize(input.iter().copied()).count()
            };
            let start = rng.gen_range(0..input.len() - 1);
            let extra = &input[start..start + 2];
            token_set.add_string(extra);
            let after = {
                let tokenizer = OptimalTokenizer::new(&mut token_set);
                tokenizer.tokenize(input.iter().copied()).count()
            };
            assert!(after <= before, "adding {:?} grew the output", extra);
        }
    }

    #[test]
    fn scanner_yields_longest_suffix_match() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut token_set = hex_set_with(&[b"a", b"ab", b"bab", b"bb", b"abcd"]);
        token_set.compute_suffix_tokens();
        let scanner = tinytok::SuffixScanner::new(&token_set);
        for _ in 0..20 {
            let len = rng.gen_range(5..60);
            let input: Vec<u8> = (0..len).map(|_| b"abcd"[rng.gen_range(0..4)]).collect();
            let outputs: Vec<TokenRef> = scanner.scan(input.iter().copied()).collect();
            assert_eq!(outputs.len(), input.len());
            for (i, output) in outputs.iter().enumerate() {
                let mut expected = TokenRef::Literal(input[i]);
                for l in (1..=i + 1).rev() {
                    if let Some(token) = token_set.get(&input[i + 1 - l..=i]) {
                        expected = TokenRef::Token(token.id());
                        break;
                    }
                }
                assert_eq!(*output, expected, "position {} of {:?}", i, input);
            }
        }
    }

    #[test]
    fn suffix_tokens_point_to_longest_proper_suffix() {
        let mut token_set = hex_set_with(&[b"abcd", b"bcd", b"cd", b"xcd", b"qq"]);
        token_set.compute_suffix_tokens();
        let get = |s: &[u8]| token_set.get(s).unwrap();
        assert_eq!(
            get(b"abcd").suffix_token(),
            Some(TokenRef::Token(get(b"bcd").id()))
        );
        assert_eq!(
            get(b"bcd").suffix_token(),
            Some(TokenRef::Token(get(b"cd").id()))
        );
        assert_eq!(
            get(b"xcd").suffix_token(),
            Some(TokenRef::Token(get(b"cd").id()))
        );
        // "d" is a hex digit token, so "cd" chains to it rather than to a
        // literal; "qq" has no suffix token at all.
        assert_eq!(
            get(b"cd").suffix_token(),
            Some(TokenRef::Token(get(b"d").id()))
        );
        assert_eq!(get(b"qq").suffix_token(), Some(TokenRef::Literal(b'q')));
        assert_eq!(get(b"d").suffix_token(), None);
    }

    #[test]
    fn token_set_basic_invariants() {
        let mut token_set = build_hex_token_set();
        assert_eq!(token_set.ntokens(), 17);
        assert!(token_set.has_hex());
        assert!(!token_set.has_bits());
        assert_eq!(token_set.literal_cost(), 3);

        token_set.add_string(b"ab");
        token_set.add_string(b"ab");
        assert_eq!(token_set.ntokens(), 18, "duplicate insert is a no-op");
        token_set.add_byte(b'0', false);
        assert_eq!(token_set.ntokens(), 18, "reserved byte already present");

        token_set.add_string(b"z");
        assert_eq!(token_set.byte_token(b'z').unwrap().string(), b"z");

        for (i, token) in token_set.tokens().iter().enumerate() {
            assert_eq!(token.id() as usize, i);
        }
    }

    #[test]
    fn remove_token_compacts_ids() {
        let mut token_set = hex_set_with(&[b"ab", b"cd", b"ef"]);
        assert_eq!(token_set.get(b"ef").unwrap().id(), 19);
        token_set.remove_token(b"cd");
        assert!(token_set.get(b"cd").is_none());
        assert_eq!(token_set.ntokens(), 19);
        for (i, token) in token_set.tokens().iter().enumerate() {
            assert_eq!(token.id() as usize, i);
        }
        assert_eq!(token_set.get(b"ef").unwrap().id(), 18);
        assert!(token_set.has_hex(), "mandatory index survives a rebuild");
    }

    #[test]
    #[should_panic(expected = "mandatory")]
    fn remove_mandatory_token_panics() {
        let mut token_set = build_hex_token_set();
        token_set.remove_token(b"0");
    }

    #[test]
    #[should_panic(expected = "unknown")]
    fn remove_unknown_token_panics() {
        let mut token_set = build_hex_token_set();
        token_set.remove_token(b"zz");
    }

    #[test]
    fn sort_orders_by_string() {
        let mut token_set = hex_set_with(&[b"zz", b"aa", b"mm"]);
        token_set.sort();
        let strings: Vec<&[u8]> = token_set.tokens().iter().map(|t| t.string()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted);
        assert!(token_set.has_hex(), "sorting keeps the fallback indices");
        for (i, token) in token_set.tokens().iter().enumerate() {
            assert_eq!(token.id() as usize, i);
        }
    }

    #[test]
    fn bits_set_does_not_gain_hex_from_strings() {
        let mut token_set = build_bits_token_set();
        token_set.add_string(&[16]);
        for b in b'0'..=b'9' {
            token_set.add_string(&[b]);
        }
        for b in b'a'..=b'f' {
            token_set.add_string(&[b]);
        }
        assert!(token_set.has_bits());
        assert!(
            !token_set.has_hex(),
            "only add_byte may claim the named fallback slots"
        );
    }

    #[test]
    fn filter_reserved_is_idempotent() {
        let input = "a\u{12}b\u{16}c";
        let once: String = Reserved::new(input.chars()).collect();
        let twice: String = Reserved::new(once.chars()).collect();
        assert_eq!(once, format!("a{}b{}c", CHR_UNKNOWN, CHR_UNKNOWN));
        assert_eq!(once, twice);
    }

    #[test]
    fn filter_caps_is_identity_on_lowercase() {
        let input = "hello there, friend.\nnew line";
        let encoded: String = Caps::new(input.chars()).collect();
        assert_eq!(encoded, input);
    }

    #[test]
    fn filter_caps_folds_case() {
        let encoded: String = Caps::new("Hello World".chars()).collect();
        assert_eq!(
            encoded,
            format!("{}hello {}world", CHR_CAPITALIZE, CHR_CAPITALIZE)
        );

        let encoded: String = Caps::new("HELLO".chars()).collect();
        assert_eq!(encoded, format!("{}hello", CHR_ALL_CAPS));

        let encoded: String = Caps::new("A".chars()).collect();
        assert_eq!(encoded, format!("{}a", CHR_CAPITALIZE));

        // Mixed-case words pass through verbatim.
        let encoded: String = Caps::new("McDonald".chars()).collect();
        assert_eq!(encoded, "McDonald");
    }

    #[test]
    fn filter_caps_round_trip() {
        for input in ["Hello World", "HELLO there", "A b C", "plain text, no caps"] {
            let encoded: String = Caps::new(input.chars()).collect();
            let decoded: String = CapsDecode::new(encoded.chars()).collect();
            assert_eq!(decoded, input);
        }
    }

    #[test]
    fn filter_words_marks_ends_and_elides_spaces() {
        let encoded: String = Words::new("hello world".chars()).collect();
        assert_eq!(
            encoded,
            format!("hello{}world{}", CHR_END_OF_WORD, CHR_END_OF_WORD)
        );

        // The space before a non-word character is preserved.
        let encoded: String = Words::new("hello , world".chars()).collect();
        assert_eq!(
            encoded,
            format!("hello{} , world{}", CHR_END_OF_WORD, CHR_END_OF_WORD)
        );

        let encoded: String = Words::new("end.".chars()).collect();
        assert_eq!(encoded, format!("end{}.", CHR_END_OF_WORD));
    }

    #[test]
    fn filter_words_round_trip() {
        for input in [
            "hello world",
            "one two three",
            "word. and, more; text",
            "spaced  out",
        ] {
            let encoded: String = Words::new(input.chars()).collect();
            let decoded: String = WordsDecode::new(encoded.chars()).collect();
            assert_eq!(decoded, input);
        }
    }

    #[test]
    fn filter_chain_composes_and_round_trips() {
        let input = "Hello World";
        let encoded: String = Words::new(Caps::new(input.chars())).collect();
        assert_eq!(
            encoded,
            format!(
                "{}hello{}{}world{}",
                CHR_CAPITALIZE, CHR_END_OF_WORD, CHR_CAPITALIZE, CHR_END_OF_WORD
            )
        );
        let decoded: String = CapsDecode::new(WordsDecode::new(encoded.chars())).collect();
        assert_eq!(decoded, input);
    }

    #[test]
    fn filter_chain_bypasses_invalid_utf8() {
        let chunk = [0xFFu8, 0x41, 0xFE];
        let out = FilterChain::CapsWords.encode(&chunk);
        assert_eq!(out.as_ref(), chunk);
        let raw = FilterChain::Raw.encode(b"Hello");
        assert_eq!(raw.as_ref(), b"Hello");
        let caps = FilterChain::Caps.encode("Hello".as_bytes());
        assert_eq!(caps.as_ref(), format!("{}hello", CHR_CAPITALIZE).as_bytes());
    }

    #[test]
    fn filter_chain_names() {
        assert_eq!(FilterChain::Raw.names(), &[] as &[&str]);
        assert_eq!(FilterChain::Caps.names(), &["caps"]);
        assert_eq!(FilterChain::CapsWords.names(), &["caps", "words"]);
    }

    #[test]
    fn text_file_maps_whole_contents() {
        let file = write_temp(b"line one\nline two\n");
        let text = TextFile::open(file.path()).unwrap();
        assert_eq!(text.all_bytes(), b"line one\nline two\n");
        assert_eq!(text.len(), 18);
    }

    #[test]
    fn sample_bytes_aligns_to_separator() {
        let mut content = Vec::new();
        for i in 0..200 {
            content.extend_from_slice(format!("line number {}\n", i).as_bytes());
        }
        let file = write_temp(&content);
        let text = TextFile::open(file.path()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let sample = text.sample_bytes(&mut rng, 64, b"\n");
            assert!(sample.len() >= 64);
            let offset = sample.as_ptr() as usize - text.all_bytes().as_ptr() as usize;
            assert!(offset == 0 || sample[0] == b'\n');
            assert!(offset + sample.len() == text.len() || sample.ends_with(b"\n"));
        }
        // Requesting the whole file returns it unsampled.
        let all = text.sample_bytes(&mut rng, text.len(), b"\n");
        assert_eq!(all, text.all_bytes());
    }

    #[test]
    fn chunk_provider_modes() {
        let file = write_temp(&b"abcdefgh\n".repeat(100));
        let text = TextFile::open(file.path()).unwrap();

        let whole = ChunkProvider::whole(&text, FilterChain::Raw);
        let chunks: Vec<_> = whole.chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref(), text.all_bytes());

        // nchunks * chunk_size covers the file: still one whole chunk.
        let covering = ChunkProvider::new(&text, 100, 100, FilterChain::Raw, 1);
        assert_eq!(covering.chunks().count(), 1);

        let sampled = ChunkProvider::new(&text, 7, 32, FilterChain::Raw, 1);
        let chunks: Vec<_> = sampled.chunks().collect();
        assert_eq!(chunks.len(), 7);
        for chunk in &chunks {
            assert!(chunk.len() >= 32);
        }

        // The same seed yields the same chunk sequence.
        let a = ChunkProvider::new(&text, 5, 32, FilterChain::Raw, 42);
        let b = ChunkProvider::new(&text, 5, 32, FilterChain::Raw, 42);
        let first: Vec<Vec<u8>> = a.chunks().map(|c| c.to_vec()).collect();
        let second: Vec<Vec<u8>> = b.chunks().map(|c| c.to_vec()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn top_bytes_counts_and_orders() {
        let file = write_temp(b"aabbbc\n");
        let text = TextFile::open(file.path()).unwrap();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let counts = mining::top_bytes(&data);
        assert_eq!(counts[0], (b'b', 3));
        assert_eq!(counts[1], (b'a', 2));
        // Ties are broken by byte value.
        assert_eq!(counts[2], (b'\n', 1));
        assert_eq!(counts[3], (b'c', 1));
    }

    #[test]
    fn top_substrings_finds_repeats() {
        let file = write_temp(b"abcabcabc");
        let text = TextFile::open(file.path()).unwrap();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let top = mining::top_substrings(&data, 30);
        let find = |s: &[u8]| top.iter().find(|(t, _)| t.as_ref() == s).map(|(_, c)| *c);
        assert_eq!(find(b"ab"), Some(3));
        assert_eq!(find(b"abc"), Some(3));
        assert_eq!(find(b"bca"), Some(2));
        assert_eq!(find(b"abcabc"), Some(2));
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1), "descending counts");
    }

    #[test]
    fn prune_simple_reaches_target() {
        let file = write_temp(b"ababab\n");
        let text = TextFile::open(file.path()).unwrap();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let mut token_set = hex_set_with(&[b"ab", b"zz"]);
        optimizer::prune_simple(&mut token_set, &data, 18);
        assert_eq!(token_set.ntokens(), 18);
        assert!(token_set.contains(b"ab"));
        assert!(!token_set.contains(b"zz"), "dead token is removed first");

        optimizer::prune_simple(&mut token_set, &data, 17);
        assert_eq!(token_set.ntokens(), 17);
        assert!(token_set.has_hex(), "mandatory tokens survive pruning");
    }

    #[test]
    fn prune_useful_keeps_the_valuable_token() {
        let file = write_temp(b"abababab\n");
        let text = TextFile::open(file.path()).unwrap();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let mut token_set = hex_set_with(&[b"ab", b"abab"]);
        optimizer::prune_useful(&mut token_set, &data, 18, 0);
        assert_eq!(token_set.ntokens(), 18);
        assert!(token_set.contains(b"abab"));
        assert!(!token_set.contains(b"ab"));
    }

    #[test]
    fn bpe_grows_useful_tokens() {
        let file = write_temp(b"ababab\n");
        let text = TextFile::open(file.path()).unwrap();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let mut token_set = build_hex_token_set();
        optimizer::grow_bpe(&mut token_set, &data, 19);
        assert!(token_set.ntokens() <= 19);
        assert!(token_set.has_hex());
        assert!(token_set.contains(b"ab"), "the frequent pair is learned");

        let baseline = {
            let mut bare = build_hex_token_set();
            let tokenizer = OptimalTokenizer::new(&mut bare);
            tokenizer.tokenize_chunks(&data).total_tokens()
        };
        let trained = {
            let tokenizer = OptimalTokenizer::new(&mut token_set);
            tokenizer.tokenize_chunks(&data).total_tokens()
        };
        assert!(trained < baseline);
    }

    #[test]
    fn artifact_round_trip() {
        let mut token_set = hex_set_with(&[b"hello", b" ", b"ab"]);
        token_set.add_string(&[0xC3]);
        token_set.sort();
        let trained = Trained {
            stats: StatsSummary {
                ntokens: token_set.ntokens(),
                scanned_bytes: 100,
                used_tokens: 5,
                total_tokens: 42,
                bytes_per_token: 2.4,
                bits_per_byte: 1.9,
            },
            optimizer: OptimizerInfo {
                fallback16: true,
                kind: "top_str".to_string(),
                filters: vec!["caps".to_string()],
                init_mult: None,
                init_tokens: None,
                top_to_remove: None,
            },
            token_set,
        };
        let text = artifact::pretty(&artifact::to_json(&trained));
        let loaded = artifact::from_json_str(&text).unwrap();

        assert_eq!(loaded.ntokens(), trained.token_set.ntokens());
        assert!(loaded.has_hex());
        for token in trained.token_set.tokens() {
            let other = loaded
                .get(token.string())
                .unwrap_or_else(|| panic!("missing token {:?}", token.string()));
            assert_eq!(other.is_mandatory(), token.is_mandatory());
        }
    }

    #[test]
    fn artifact_renders_tokens_as_strings_or_byte_arrays() {
        assert_eq!(
            artifact::token_value(b"ab"),
            serde_json::Value::String("ab".to_string())
        );
        assert_eq!(artifact::token_value(&[0xC3]), serde_json::json!([195]));
    }

    #[test]
    fn artifact_rejects_malformed_documents() {
        assert!(matches!(
            artifact::from_json_str("{"),
            Err(artifact::LoadArtifactError::Json(_))
        ));
        assert!(matches!(
            artifact::from_json_str("{\"tokens\": []}"),
            Err(artifact::LoadArtifactError::Invalid(_))
        ));
        let no_tokens = "{\"config\": {\"fallback16\": true}}";
        assert!(matches!(
            artifact::from_json_str(no_tokens),
            Err(artifact::LoadArtifactError::Invalid(_))
        ));
        let bad_byte = "{\"config\": {\"fallback16\": true}, \"tokens\": [[300]]}";
        assert!(matches!(
            artifact::from_json_str(bad_byte),
            Err(artifact::LoadArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn pretty_printer_keeps_short_values_on_one_line() {
        let value = serde_json::json!({
            "tokens": ["a", "b", "ab"],
            "padding": "x".repeat(90),
        });
        let text = artifact::pretty(&value);
        assert!(
            text.contains("\"tokens\": [\"a\",\"b\",\"ab\"]"),
            "short values stay on one line:\n{}",
            text
        );

        let long = serde_json::json!({
            "list": (0..40).map(|i| format!("token-{}", i)).collect::<Vec<_>>(),
        });
        let text = artifact::pretty(&long);
        assert!(text.lines().count() > 40, "long arrays go one per line");
        for line in text.lines() {
            assert!(line.len() <= 100, "line too long: {}", line);
        }
    }

    #[test]
    fn train_end_to_end() {
        // Line counters keep very long substrings rare, so mining stays at
        // realistic lengths even on a small corpus.
        let mut corpus = Vec::new();
        for i in 0..60 {
            corpus.extend_from_slice(
                format!("the {:02} quick brown fox {:02} jumps over the dog\n", i, i).as_bytes(),
            );
        }
        let file = write_temp(&corpus);
        let text = TextFile::open(file.path()).unwrap();
        let options = TrainOptions {
            ntokens: 20,
            nchunks: 0,
            chunk_size: 0,
            seed: 0,
        };
        let trained = train(&text, &options);

        assert!(trained.token_set.ntokens() <= 20);
        assert!(trained.token_set.has_bits() || trained.token_set.has_hex());
        assert!(trained.stats.total_tokens > 0);
        assert!(!trained.optimizer.kind.is_empty());
        let strings: Vec<&[u8]> = trained.token_set.tokens().iter().map(|t| t.string()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted, "the winner is sorted for serialization");

        // Saving and loading preserves tokenization behavior exactly.
        let out = tempfile::NamedTempFile::new().unwrap();
        artifact::save(&trained, out.path()).unwrap();
        let mut reloaded = artifact::load(out.path()).unwrap();
        let mut original = trained.token_set.clone();
        let data = ChunkProvider::whole(&text, FilterChain::Raw);
        let total_original = {
            let tokenizer = OptimalTokenizer::new(&mut original);
            tokenizer.tokenize_chunks(&data).total_tokens()
        };
        let total_reloaded = {
            let tokenizer = OptimalTokenizer::new(&mut reloaded);
            tokenizer.tokenize_chunks(&data).total_tokens()
        };
        assert_eq!(total_original, total_reloaded);
    }

    #[test]
    fn stats_derived_quantities() {
        let mut token_set = hex_set_with(&[b"ab"]);
        let tokenizer = OptimalTokenizer::new(&mut token_set);
        let mut stats = tinytok::TokenStats::new(tokenizer.token_set().ntokens());
        tokenizer.tokenize_and_count(b"ababab", &mut stats);
        assert_eq!(stats.scanned_bytes(), 6);
        assert_eq!(stats.total_tokens(), 3);
        assert_eq!(stats.used_tokens(), 1);
        assert_eq!(stats.bytes_per_token(), 2.0);
        let expected = 0.5 * (18f64).log2();
        assert!((stats.bits_per_byte() - expected).abs() < 1e-9);
        let summary = stats.summary();
        assert_eq!(summary.total_tokens, 3);
        assert_eq!(summary.ntokens, 18);
    }
}
