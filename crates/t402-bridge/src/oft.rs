//! LayerZero OFT and ERC-20 ABI, plus the encoding helpers around them.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolEvent, sol};

use crate::chains::BridgeChain;
use crate::client::ReceiptLog;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct SendParam {
        uint32 dstEid;
        bytes32 to;
        uint256 amountLD;
        uint256 minAmountLD;
        bytes extraOptions;
        bytes composeMsg;
        bytes oftCmd;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct MessagingFee {
        uint256 nativeFee;
        uint256 lzTokenFee;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct MessagingReceipt {
        bytes32 guid;
        uint64 nonce;
        MessagingFee fee;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct OFTReceipt {
        uint256 amountSentLD;
        uint256 amountReceivedLD;
    }

    interface IOFT {
        function quoteSend(SendParam calldata _sendParam, bool _payInLzToken)
            external view returns (MessagingFee memory msgFee);

        function send(SendParam calldata _sendParam, MessagingFee calldata _fee, address _refundAddress)
            external payable returns (MessagingReceipt memory msgReceipt, OFTReceipt memory oftReceipt);

        event OFTSent(
            bytes32 indexed guid,
            uint32 dstEid,
            address indexed fromAddress,
            uint256 amountSentLD,
            uint256 amountReceivedLD
        );
    }

    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

const BPS_DENOMINATOR: u64 = 10_000;

/// EVM address left-padded to the `bytes32` recipient OFT expects.
pub fn address_to_bytes32(address: Address) -> B256 {
    address.into_word()
}

/// `amount` reduced by `slippage_percent` (0.5 means 0.5%), rounded to basis points.
pub fn min_amount_after_slippage(amount: U256, slippage_percent: f64) -> U256 {
    let bps = (slippage_percent * 100.0).round().clamp(0.0, BPS_DENOMINATOR as f64) as u64;
    let bps = U256::from(bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    // Split to avoid overflowing on amount * bps.
    let cut = amount / denominator * bps + amount % denominator * bps / denominator;
    amount - cut
}

pub fn send_param(to_chain: BridgeChain, recipient: Address, amount: U256, min_amount: U256) -> SendParam {
    SendParam {
        dstEid: to_chain.endpoint_id(),
        to: address_to_bytes32(recipient),
        amountLD: amount,
        minAmountLD: min_amount,
        extraOptions: Bytes::new(),
        composeMsg: Bytes::new(),
        oftCmd: Bytes::new(),
    }
}

/// GUID of the first `OFTSent` event emitted by `oft` in a receipt.
pub fn find_message_guid(logs: &[ReceiptLog], oft: Address) -> Option<B256> {
    logs.iter()
        .filter(|log| log.address == oft)
        .find(|log| log.topics.first() == Some(&IOFT::OFTSent::SIGNATURE_HASH))
        .and_then(|log| log.topics.get(1).copied())
}
