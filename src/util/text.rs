/// テキスト処理ユーティリティ。
///
/// ハッシングを提供します。
use xxhash_rust::xxh3::xxh3_64;

/// テキストをXXH3でハッシュする。
///
/// XXH3は高速で衝突率が低いハッシュアルゴリズムです。
#[must_use]
pub fn hash_text(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_text_is_deterministic() {
        let text = "Hello, world!";
        let hash1 = hash_text(text);
        let hash2 = hash_text(text);
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn hash_text_produces_different_hashes() {
        let text1 = "Hello, world!";
        let text2 = "Goodbye, world!";
        let hash1 = hash_text(text1);
        let hash2 = hash_text(text2);
        assert_ne!(hash1, hash2);
    }
}
