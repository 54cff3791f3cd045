// Groth16 verification over BLS12-381

use blstrs::{pairing, G1Affine, G1Projective, G2Affine, Scalar};
use group::Curve;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::token::errors::{TokenError, TokenResult};

/// Groth16 verifying key.
///
/// `ic` carries one point per public input plus the constant term at `ic[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKey {
    pub alpha_g1: G1Affine,
    pub beta_g2: G2Affine,
    pub gamma_g2: G2Affine,
    pub delta_g2: G2Affine,
    pub ic: Vec<G1Affine>,
}

impl VerifyingKey {
    /// Number of public inputs the circuit takes
    pub fn num_inputs(&self) -> usize {
        self.ic.len().saturating_sub(1)
    }

    /// Linear combination of `ic` with the public inputs.
    fn prepare_inputs(&self, inputs: &[Scalar]) -> TokenResult<G1Affine> {
        if self.ic.is_empty() || inputs.len() != self.num_inputs() {
            return Err(TokenError::InputCountMismatch {
                expected: self.num_inputs(),
                got: inputs.len(),
            });
        }
        let mut acc = G1Projective::from(self.ic[0]);
        for (input, point) in inputs.iter().copied().zip(&self.ic[1..]) {
            acc += G1Projective::from(*point) * input;
        }
        Ok(acc.to_affine())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub a: G1Affine,
    pub b: G2Affine,
    pub c: G1Affine,
}

/// Check `e(A, B) = e(alpha, beta) + e(vk_x, gamma) + e(C, delta)` in the
/// additively written target group.
///
/// A wrong number of inputs is a verification failure, not an error.
pub fn verify_proof(vk: &VerifyingKey, proof: &Proof, inputs: &[Scalar]) -> bool {
    let vk_x = match vk.prepare_inputs(inputs) {
        Ok(point) => point,
        Err(err) => {
            debug!("Rejecting proof: {}", err);
            return false;
        }
    };

    let lhs = pairing(&proof.a, &proof.b);
    let rhs = pairing(&vk.alpha_g1, &vk.beta_g2)
        + pairing(&vk_x, &vk.gamma_g2)
        + pairing(&proof.c, &vk.delta_g2);
    lhs == rhs
}

/// A verifier bound to one circuit's key
#[derive(Debug, Clone)]
pub struct Verifier {
    vk: VerifyingKey,
}

impl Verifier {
    pub fn new(vk: VerifyingKey) -> Self {
        Self { vk }
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.vk
    }

    pub fn verify(&self, proof: &Proof, inputs: &[Scalar]) -> bool {
        verify_proof(&self.vk, proof, inputs)
    }

    /// Like `verify`, with the failure reason.
    pub fn check(&self, proof: &Proof, inputs: &[Scalar]) -> TokenResult<()> {
        self.vk.prepare_inputs(inputs)?;
        if self.verify(proof, inputs) {
            Ok(())
        } else {
            Err(TokenError::InvalidProof)
        }
    }
}

/// Setup that keeps its toxic waste, so it can produce proofs for any input.
///
/// Only meant for tests: whoever holds the trapdoor can forge proofs.
#[cfg(any(test, feature = "test-utils"))]
pub mod simulator {
    use blstrs::{G1Projective, G2Projective, Scalar};
    use ff::Field;
    use group::{Curve, Group};
    use rand_core::RngCore;

    use super::{Proof, VerifyingKey};
    use crate::token::errors::{TokenError, TokenResult};

    pub struct Trapdoor {
        alpha: Scalar,
        beta: Scalar,
        gamma: Scalar,
        delta: Scalar,
        ic: Vec<Scalar>,
    }

    fn nonzero_scalar<R: RngCore>(rng: &mut R) -> Scalar {
        loop {
            let s = Scalar::random(&mut *rng);
            if !bool::from(s.is_zero()) {
                return s;
            }
        }
    }

    /// Generate a verifying key for a circuit with `num_inputs` public inputs.
    pub fn setup<R: RngCore>(num_inputs: usize, rng: &mut R) -> (VerifyingKey, Trapdoor) {
        let g1 = G1Projective::generator();
        let g2 = G2Projective::generator();
        let trapdoor = Trapdoor {
            alpha: nonzero_scalar(rng),
            beta: nonzero_scalar(rng),
            gamma: nonzero_scalar(rng),
            delta: nonzero_scalar(rng),
            ic: (0..=num_inputs).map(|_| Scalar::random(&mut *rng)).collect(),
        };
        let vk = VerifyingKey {
            alpha_g1: (g1 * trapdoor.alpha).to_affine(),
            beta_g2: (g2 * trapdoor.beta).to_affine(),
            gamma_g2: (g2 * trapdoor.gamma).to_affine(),
            delta_g2: (g2 * trapdoor.delta).to_affine(),
            ic: trapdoor.ic.iter().map(|u| (g1 * *u).to_affine()).collect(),
        };
        (vk, trapdoor)
    }

    impl Trapdoor {
        /// A proof that verifies against the matching key for `inputs`.
        pub fn prove<R: RngCore>(&self, inputs: &[Scalar], rng: &mut R) -> TokenResult<Proof> {
            if inputs.len() + 1 != self.ic.len() {
                return Err(TokenError::InputCountMismatch {
                    expected: self.ic.len() - 1,
                    got: inputs.len(),
                });
            }
            let delta_inv = Option::<Scalar>::from(self.delta.invert())
                .ok_or_else(|| TokenError::Setup("delta is not invertible".to_string()))?;

            let mut v = self.ic[0];
            for (input, u) in inputs.iter().zip(&self.ic[1..]) {
                v += *input * u;
            }

            let r = nonzero_scalar(rng);
            let s = nonzero_scalar(rng);
            let c = (r * s - self.alpha * self.beta - v * self.gamma) * delta_inv;

            Ok(Proof {
                a: (G1Projective::generator() * r).to_affine(),
                b: (G2Projective::generator() * s).to_affine(),
                c: (G1Projective::generator() * c).to_affine(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::simulator::setup;
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn inputs(values: &[u64]) -> Vec<Scalar> {
        values.iter().map(|v| Scalar::from(*v)).collect()
    }

    #[test]
    fn test_valid_proof_verifies() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (vk, trapdoor) = setup(2, &mut rng);
        let public = inputs(&[9, 1]);
        let proof = trapdoor.prove(&public, &mut rng).unwrap();

        assert!(verify_proof(&vk, &proof, &public));
        assert!(Verifier::new(vk).check(&proof, &public).is_ok());
    }

    #[test]
    fn test_proof_bound_to_inputs() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let (vk, trapdoor) = setup(2, &mut rng);
        let proof = trapdoor.prove(&inputs(&[9, 1]), &mut rng).unwrap();

        assert!(!verify_proof(&vk, &proof, &inputs(&[4, 1])));
        let verifier = Verifier::new(vk);
        assert_eq!(
            verifier.check(&proof, &inputs(&[4, 1])),
            Err(TokenError::InvalidProof)
        );
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (vk, trapdoor) = setup(2, &mut rng);
        let public = inputs(&[9, 1]);
        let mut proof = trapdoor.prove(&public, &mut rng).unwrap();
        proof.c = proof.a;

        assert!(!verify_proof(&vk, &proof, &public));
    }

    #[test]
    fn test_foreign_key_rejects_proof() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (_, trapdoor) = setup(2, &mut rng);
        let (other_vk, _) = setup(2, &mut rng);
        let public = inputs(&[9, 1]);
        let proof = trapdoor.prove(&public, &mut rng).unwrap();

        assert!(!verify_proof(&other_vk, &proof, &public));
    }

    #[test]
    fn test_input_count_checked() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (vk, trapdoor) = setup(2, &mut rng);
        let proof = trapdoor.prove(&inputs(&[9, 1]), &mut rng).unwrap();

        assert_eq!(vk.num_inputs(), 2);
        assert!(!verify_proof(&vk, &proof, &inputs(&[9])));
        assert_eq!(
            Verifier::new(vk).check(&proof, &inputs(&[9, 1, 0])),
            Err(TokenError::InputCountMismatch { expected: 2, got: 3 })
        );
        assert!(trapdoor.prove(&inputs(&[1]), &mut rng).is_err());
    }
}
