//! Facilitator side of the EVM `exact` scheme.
//!
//! The signer is recovered from the EIP-712 hash of `TransferWithAuthorization`
//! and must equal `authorization.from`. The relayed body is the ABI-encoded
//! `transferWithAuthorization(..., v, r, s)` call on the token contract.

use alloy_primitives::{Address, Signature, hex};
use alloy_sol_types::{SolCall, SolStruct};
use t402_types::chain::SignedPayload;
use t402_types::proto::PaymentVerificationError;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::scheme::{
    Authorization, ExactChainFamily, ExactFacilitator, ReplayToken, VerifyContext,
};

use crate::types::{
    EIP155_NAMESPACE, ExactEvmPayload, domain_name_version, eip712_domain, evm_chain_id,
    parse_address, transferWithAuthorizationCall,
};

/// EIP-3009 rules for the shared `exact` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eip155ExactFamily;

pub type Eip155ExactFacilitator<P> = ExactFacilitator<Eip155ExactFamily, P>;

impl Eip155ExactFamily {
    fn asset(requirements: &PaymentRequirements) -> Result<Address, PaymentVerificationError> {
        parse_address(&requirements.asset).ok_or_else(|| {
            PaymentVerificationError::InvalidFormat(format!(
                "asset {} is not an EVM address",
                requirements.asset
            ))
        })
    }
}

impl ExactChainFamily for Eip155ExactFamily {
    type Payload = ExactEvmPayload;

    fn namespace(&self) -> &'static str {
        EIP155_NAMESPACE
    }

    fn authorization(
        &self,
        payload: &ExactEvmPayload,
        requirements: &PaymentRequirements,
    ) -> Result<Authorization, PaymentVerificationError> {
        let asset = Self::asset(requirements)?;
        let authorization = &payload.authorization;
        Ok(Authorization {
            payer: authorization.from.to_checksum(None),
            recipient: authorization.to.to_checksum(None),
            asset: asset.to_checksum(None),
            amount: authorization.value,
            valid_after: Some(authorization.valid_after),
            valid_before: Some(authorization.valid_before),
            replay: ReplayToken::Nonce(authorization.nonce.to_string()),
        })
    }

    fn same_address(&self, a: &str, b: &str) -> bool {
        match (parse_address(a), parse_address(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn verify_signature(
        &self,
        payload: &ExactEvmPayload,
        _authorization: &Authorization,
        ctx: &VerifyContext<'_>,
    ) -> Result<(), PaymentVerificationError> {
        let chain_id = evm_chain_id(ctx.chain_id).ok_or_else(|| {
            PaymentVerificationError::InvalidFormat(format!("{} is not an EVM chain", ctx.chain_id))
        })?;
        let asset = Self::asset(ctx.requirements)?;
        let (name, version) = domain_name_version(ctx.requirements);
        let domain = eip712_domain(name, version, chain_id, asset);
        let hash = payload
            .authorization
            .typed_message()
            .eip712_signing_hash(&domain);

        let signature = Signature::from_raw(&payload.signature)
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        let recovered = signature
            .recover_address_from_prehash(&hash)
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        if recovered != payload.authorization.from {
            return Err(PaymentVerificationError::InvalidSignature(format!(
                "recovered signer {recovered} is not {}",
                payload.authorization.from
            )));
        }
        Ok(())
    }

    fn signed_payload(
        &self,
        payload: &ExactEvmPayload,
        authorization: &Authorization,
    ) -> Result<SignedPayload, PaymentVerificationError> {
        let signature = Signature::from_raw(&payload.signature)
            .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
        let evm = &payload.authorization;
        let message = evm.typed_message();
        let call = transferWithAuthorizationCall {
            from: message.from,
            to: message.to,
            value: message.value,
            validAfter: message.validAfter,
            validBefore: message.validBefore,
            nonce: message.nonce,
            v: 27 + u8::from(signature.v()),
            r: signature.r().into(),
            s: signature.s().into(),
        };
        #[cfg(feature = "telemetry")]
        tracing::debug!(payer = %authorization.payer, asset = %authorization.asset, "Prepared transferWithAuthorization call");
        Ok(SignedPayload {
            payer: authorization.payer.clone(),
            target: Some(authorization.asset.clone()),
            body: hex::encode_prefixed(call.abi_encode()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExactEvmAuthorization;
    use alloy_primitives::{B256, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use t402_types::chain::ChainId;
    use t402_types::timestamp::UnixTimestamp;
    use t402_types::util::TokenAmount;

    const ASSET: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: ChainId::new("eip155", "8453"),
            asset: ASSET.into(),
            amount: TokenAmount::from(10_000u64),
            pay_to: PAY_TO.into(),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    fn signed_payload(signer: &PrivateKeySigner, requirements: &PaymentRequirements) -> ExactEvmPayload {
        let authorization = ExactEvmAuthorization {
            from: signer.address(),
            to: parse_address(PAY_TO).unwrap(),
            value: TokenAmount::from(10_000u64),
            valid_after: UnixTimestamp::from_secs(1_700_000_000),
            valid_before: UnixTimestamp::from_secs(1_700_000_300),
            nonce: B256::repeat_byte(7),
        };
        let (name, version) = domain_name_version(requirements);
        let domain = eip712_domain(name, version, 8453, parse_address(ASSET).unwrap());
        let hash = authorization.typed_message().eip712_signing_hash(&domain);
        let signature = signer.sign_hash_sync(&hash).unwrap();
        ExactEvmPayload {
            signature: signature.as_bytes().into(),
            authorization,
        }
    }

    fn context<'a>(requirements: &'a PaymentRequirements, signers: &'a [String]) -> VerifyContext<'a> {
        VerifyContext {
            chain_id: &requirements.network,
            requirements,
            signers,
        }
    }

    #[test]
    fn test_recovers_payer_signature() {
        let signer = PrivateKeySigner::random();
        let requirements = requirements();
        let payload = signed_payload(&signer, &requirements);
        let family = Eip155ExactFamily;
        let authorization = family.authorization(&payload, &requirements).unwrap();
        assert_eq!(authorization.payer, signer.address().to_checksum(None));
        assert!(
            family
                .verify_signature(&payload, &authorization, &context(&requirements, &[]))
                .is_ok()
        );
    }

    #[test]
    fn test_tampered_amount_fails_recovery() {
        let signer = PrivateKeySigner::random();
        let requirements = requirements();
        let mut payload = signed_payload(&signer, &requirements);
        payload.authorization.value = TokenAmount::from(20_000u64);
        let family = Eip155ExactFamily;
        let authorization = family.authorization(&payload, &requirements).unwrap();
        let result = family.verify_signature(&payload, &authorization, &context(&requirements, &[]));
        assert!(matches!(
            result,
            Err(PaymentVerificationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_domain_fails_recovery() {
        let signer = PrivateKeySigner::random();
        let requirements = requirements();
        let payload = signed_payload(&signer, &requirements);
        let mut other = requirements.clone();
        other.extra = Some(serde_json::json!({"name": "Other", "version": "1"}));
        let family = Eip155ExactFamily;
        let authorization = family.authorization(&payload, &other).unwrap();
        assert!(
            family
                .verify_signature(&payload, &authorization, &context(&other, &[]))
                .is_err()
        );
    }

    #[test]
    fn test_calldata_targets_asset() {
        let signer = PrivateKeySigner::random();
        let requirements = requirements();
        let payload = signed_payload(&signer, &requirements);
        let family = Eip155ExactFamily;
        let authorization = family.authorization(&payload, &requirements).unwrap();
        let signed = family.signed_payload(&payload, &authorization).unwrap();
        assert_eq!(signed.target.as_deref(), Some(ASSET));
        let calldata = hex::decode(&signed.body).unwrap();
        assert_eq!(&calldata[..4], transferWithAuthorizationCall::SELECTOR.as_slice());
        let decoded = transferWithAuthorizationCall::abi_decode(&calldata).unwrap();
        assert_eq!(decoded.from, signer.address());
        assert_eq!(decoded.value, U256::from(10_000u64));
        assert!(decoded.v == 27 || decoded.v == 28);
    }

    #[test]
    fn test_addresses_compare_case_insensitively() {
        let family = Eip155ExactFamily;
        assert!(family.same_address(PAY_TO, &PAY_TO.to_lowercase()));
        assert!(!family.same_address(PAY_TO, ASSET));
        assert!(!family.same_address("not-an-address", "not-an-address"));
    }
}
