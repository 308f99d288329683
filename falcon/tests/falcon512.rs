use ivrf_falcon::rng::Prng;
use ivrf_falcon::{fpr, verify, zq, PublicKey, SecretKey, Signature};

const LOGN: u32 = 9;

#[test]
fn degree_512_self_test() {
    let seed = [0x42u8; 48];
    let message = [0u8; 32];

    let (sk, pk) = SecretKey::keygen_from_seed(LOGN, &seed).unwrap();

    // the public key must be re-derivable from the basis
    assert_eq!(pk, sk.public_key().unwrap());

    let sig = sk.sign_with(&message, [0x17; 40], Prng::from_seed(b"falcon-512 self test"));
    assert!(verify(&pk, &message, &sig));

    // recompute s1 = hm - s2*h and check the aggregate norm directly
    let hm = ivrf_falcon::hash_to_point(sig.nonce(), &message, LOGN);
    let s1 = zq::recover_s1(&hm, sig.s2(), pk.coefficients(), LOGN);
    let norm: u64 = s1
        .iter()
        .chain(sig.s2())
        .map(|&x| (x as i64 * x as i64) as u64)
        .sum();
    assert!(norm < fpr::L2_BOUND[LOGN as usize] as u64);

    // wire formats round-trip at the published sizes
    let pk_bytes = pk.to_bytes();
    assert_eq!(pk_bytes.len(), 897);
    assert_eq!(PublicKey::from_bytes(&pk_bytes).unwrap(), pk);

    let sk_bytes = sk.to_bytes();
    assert_eq!(sk_bytes.len(), 1281);
    assert_eq!(SecretKey::from_bytes(&sk_bytes).unwrap(), sk);

    let sig_bytes = sig.to_bytes();
    assert!(sig_bytes.len() <= 752);
    let decoded = Signature::from_bytes(&sig_bytes).unwrap();
    assert!(verify(&pk, &message, &decoded));
}

#[test]
fn degree_512_keygen_is_deterministic() {
    let seed = [0x42u8; 48];
    let (sk1, pk1) = SecretKey::keygen_from_seed(LOGN, &seed).unwrap();
    let (sk2, pk2) = SecretKey::keygen_from_seed(LOGN, &seed).unwrap();
    assert_eq!(sk1, sk2);
    assert_eq!(pk1, pk2);
}

#[test]
fn degree_512_tampered_signature_is_rejected() {
    let seed = [0x42u8; 48];
    let message = [0u8; 32];
    let (sk, pk) = SecretKey::keygen_from_seed(LOGN, &seed).unwrap();
    let sig = sk.sign_with(&message, [0x23; 40], Prng::from_seed(b"tamper test"));

    let mut wrong_message = message;
    wrong_message[0] ^= 1;
    assert!(!verify(&pk, &wrong_message, &sig));

    let mut bytes = sig.to_bytes();
    // flip one bit inside the salt
    bytes[5] ^= 0x40;
    if let Ok(bad) = Signature::from_bytes(&bytes) {
        assert!(!verify(&pk, &message, &bad));
    }
}
