use blstrs::Scalar;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use flightsurety_core::ledger::AccountId;
use flightsurety_core::token::verifier::simulator::setup;
use flightsurety_core::token::{MintableToken, SolutionMintGate, TokenError, Verifier};

fn inputs(values: &[u64]) -> Vec<Scalar> {
    values.iter().map(|v| Scalar::from(*v)).collect()
}

#[test]
fn test_solutions_mint_distinct_tokens() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let (vk, trapdoor) = setup(2, &mut rng);

    let owner = AccountId::from_label("owner");
    let alice = AccountId::from_label("alice");
    let bob = AccountId::from_label("bob");
    let token = MintableToken::new("Real Estate", "RE", "https://tokens.example/api/", owner);
    let mut gate = SolutionMintGate::new(Verifier::new(vk), token);

    let first = inputs(&[9, 1]);
    let second = inputs(&[16, 1]);
    let first_proof = trapdoor.prove(&first, &mut rng).unwrap();
    let second_proof = trapdoor.prove(&second, &mut rng).unwrap();

    gate.add_solution(&alice, &first_proof, &first).unwrap();
    gate.add_solution(&bob, &second_proof, &second).unwrap();

    // Proofs are not interchangeable between statements
    assert!(!gate.verify_proof(&first_proof, &second));

    let a = gate.mint_new_nft(&alice, &first, alice).unwrap();
    let b = gate.mint_new_nft(&bob, &second, bob).unwrap();
    assert_ne!(a, b);
    assert_eq!(gate.token().total_supply(), 2);
    assert_eq!(gate.token().owner_of(a).unwrap(), alice);
    assert_eq!(
        gate.token().token_uri(b).unwrap(),
        format!("https://tokens.example/api/{}", b)
    );

    assert!(matches!(
        gate.mint_new_nft(&alice, &first, alice),
        Err(TokenError::SolutionAlreadyMinted(_))
    ));

    // Minted tokens trade like any other
    gate.token_mut().transfer_from(&alice, &alice, bob, a).unwrap();
    assert_eq!(gate.token().balance_of(&bob), 2);
}
